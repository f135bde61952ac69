use anyhow::{anyhow, Context, Result};
use glam::{Mat4, Quat, Vec3, Vec4};
use log::{debug, warn};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::camera::{Camera, CameraMode};
use crate::stage::{LightingMode, Uniforms};

/// Name of the built-in cube mesh.
pub const CUBE_MESH: &str = "cube";

/// Runtime representation of a scene: one camera, one light, many objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Scene {
    pub camera: Camera,
    #[serde(default)]
    pub camera_mode: CameraMode,
    /// Object the camera tracks in non-static modes. Defaults to the first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_subject: Option<String>,
    pub light: LightSettings,
    pub objects: Vec<SceneObject>,
}

/// The single light of a scene and the model used to evaluate it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightSettings {
    pub mode: LightingMode,
    pub color: Vec3,
    /// Unit direction towards a directional light.
    pub direction: Vec3,
    pub position: Vec3,
    pub ambient: Vec3,
}

impl Default for LightSettings {
    fn default() -> Self {
        let defaults = Uniforms::default();
        Self {
            mode: defaults.mode,
            color: defaults.light_color,
            direction: defaults.light_direction,
            position: defaults.light_position,
            ambient: defaults.ambient_light,
        }
    }
}

/// Mesh instance placed in the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    /// [`CUBE_MESH`] or a path to an OBJ file, relative to the scene file.
    #[serde(default = "default_mesh")]
    pub mesh: String,
    #[serde(default = "default_color")]
    pub color: Vec4,
    #[serde(default)]
    pub position: Vec3,
    /// Euler angles in degrees, applied X then Y then Z.
    #[serde(default)]
    pub rotation: Vec3,
    #[serde(default = "default_scale")]
    pub scale: Vec3,
    /// Transform of the enclosing `<group>` elements, outermost first.
    #[serde(default)]
    pub parent: Mat4,
}

impl Default for SceneObject {
    fn default() -> Self {
        Self {
            name: String::new(),
            mesh: default_mesh(),
            color: default_color(),
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: default_scale(),
            parent: Mat4::IDENTITY,
        }
    }
}

impl SceneObject {
    /// Object-to-world transform: scale, then rotate, then translate, then
    /// the parent groups.
    pub fn model_matrix(&self) -> Mat4 {
        self.parent * local_transform(self.position, self.rotation, self.scale)
    }

    pub fn world_position(&self) -> Vec3 {
        self.model_matrix().w_axis.truncate()
    }

    /// Heading about the world Y axis, in degrees.
    pub fn world_yaw_degrees(&self) -> f32 {
        let x_axis = self.model_matrix().x_axis;
        (-x_axis.z).atan2(x_axis.x).to_degrees()
    }

    pub fn uses_builtin_cube(&self) -> bool {
        self.mesh.eq_ignore_ascii_case(CUBE_MESH)
    }
}

/// `T * Rz * Ry * Rx * S`, rotations in degrees.
fn local_transform(position: Vec3, rotation: Vec3, scale: Vec3) -> Mat4 {
    let rotation = Quat::from_rotation_z(rotation.z.to_radians())
        * Quat::from_rotation_y(rotation.y.to_radians())
        * Quat::from_rotation_x(rotation.x.to_radians());
    Mat4::from_scale_rotation_translation(scale, rotation, position)
}

fn default_mesh() -> String {
    CUBE_MESH.to_string()
}

fn default_color() -> Vec4 {
    Vec4::ONE
}

fn default_scale() -> Vec3 {
    Vec3::ONE
}

impl Scene {
    /// Parses a scene description.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid scene XML")?;
        let root = document.root_element();
        let mut scene = Scene::default();

        if let Some(node) = child(&root, "camera") {
            parse_camera(&node, &mut scene)?;
        }
        if let Some(node) = child(&root, "light") {
            scene.light = parse_light(&node).context("invalid <light>")?;
        }

        parse_objects(&root, Mat4::IDENTITY, &mut scene.objects)?;

        Ok(scene)
    }

    /// Replaces the lighting mode of every draw call.
    pub fn with_mode(mut self, mode: LightingMode) -> Self {
        self.light.mode = mode;
        self
    }

    pub fn object(&self, name: &str) -> Option<&SceneObject> {
        self.objects.iter().find(|object| object.name == name)
    }

    /// Camera after applying the camera mode to its subject.
    pub fn effective_camera(&self) -> Camera {
        if self.camera_mode == CameraMode::Static {
            return self.camera;
        }
        let subject = match &self.camera_subject {
            Some(name) => self.object(name),
            None => self.objects.first(),
        };
        match subject {
            Some(subject) => self.camera_mode.camera_for(
                subject.world_position(),
                subject.world_yaw_degrees(),
                &self.camera,
            ),
            None => {
                warn!(
                    "camera mode {} has no subject; using the static camera",
                    self.camera_mode
                );
                self.camera
            }
        }
    }

    /// Uniform set for drawing `object`.
    pub fn uniforms_for(&self, object: &SceneObject) -> Uniforms {
        self.uniforms_with_camera(object, &self.effective_camera())
    }

    pub(crate) fn uniforms_with_camera(&self, object: &SceneObject, camera: &Camera) -> Uniforms {
        let mut uniforms = Uniforms::new(self.light.mode)
            .with_model(object.model_matrix())
            .with_camera(camera);
        uniforms.light_color = self.light.color;
        uniforms.light_direction = self.light.direction;
        uniforms.light_position = self.light.position;
        uniforms.ambient_light = self.light.ambient;
        uniforms
    }
}

fn parse_camera(node: &Node<'_, '_>, scene: &mut Scene) -> Result<()> {
    let camera = &mut scene.camera;
    camera.eye = parse_vec3(optional_text(node, "eye"), camera.eye).context("invalid <eye>")?;
    camera.target =
        parse_vec3(optional_text(node, "target"), camera.target).context("invalid <target>")?;
    camera.up = parse_vec3(optional_text(node, "up"), camera.up).context("invalid <up>")?;
    camera.fov_y_degrees =
        parse_f32(optional_text(node, "fov"), camera.fov_y_degrees).context("invalid <fov>")?;
    camera.aspect =
        parse_f32(optional_text(node, "aspect"), camera.aspect).context("invalid <aspect>")?;
    camera.near = parse_f32(optional_text(node, "near"), camera.near).context("invalid <near>")?;
    camera.far = parse_f32(optional_text(node, "far"), camera.far).context("invalid <far>")?;
    let fov = camera.fov_y_degrees;
    if fov.is_nan() || fov <= 0.0 || fov >= 180.0 {
        return Err(anyhow!(
            "camera fov must be between 0 and 180 degrees, got {}",
            camera.fov_y_degrees
        ));
    }
    if camera.aspect.is_nan() || camera.aspect <= 0.0 {
        return Err(anyhow!("camera aspect must be positive, got {}", camera.aspect));
    }
    if camera.near <= 0.0 || camera.far <= camera.near {
        return Err(anyhow!(
            "camera clip range is invalid (near {}, far {})",
            camera.near,
            camera.far
        ));
    }
    if let Some(mode) = optional_text(node, "mode") {
        scene.camera_mode = mode.parse()?;
    }
    scene.camera_subject = optional_text(node, "subject");
    Ok(())
}

fn parse_light(node: &Node<'_, '_>) -> Result<LightSettings> {
    let mut light = LightSettings::default();

    light.mode = match optional_text(node, "mode") {
        Some(mode) => mode.parse()?,
        None => {
            let directional = optional_text(node, "directional");
            let point = optional_text(node, "point");
            if directional.is_none() && point.is_none() {
                light.mode
            } else {
                let directional = parse_bool(directional, false)?;
                let point = parse_bool(point, false)?;
                if directional && point {
                    warn!("both directional and point lighting are enabled; using directional");
                }
                LightingMode::from_flags(directional, point)
            }
        }
    };

    light.color = parse_vec3(optional_text(node, "color"), light.color).context("invalid <color>")?;
    light.position =
        parse_vec3(optional_text(node, "position"), light.position).context("invalid <position>")?;
    light.ambient =
        parse_vec3(optional_text(node, "ambient"), light.ambient).context("invalid <ambient>")?;

    let direction = parse_vec3(optional_text(node, "direction"), light.direction)
        .context("invalid <direction>")?;
    if direction.length_squared() > f32::EPSILON {
        light.direction = direction.normalize();
    } else if light.mode == LightingMode::Directional {
        return Err(anyhow!("light direction must not be zero"));
    } else {
        debug!("ignoring zero light direction under {} lighting", light.mode);
    }

    Ok(light)
}

/// Collects the `<object>` children of `node`, descending into `<group>`
/// elements and composing their transforms onto `parent`.
fn parse_objects(
    node: &Node<'_, '_>,
    parent: Mat4,
    objects: &mut Vec<SceneObject>,
) -> Result<()> {
    for element in node.children().filter(Node::is_element) {
        if element.has_tag_name("object") {
            let object = parse_object(&element, parent)?;
            debug!("parsed object {} (mesh {})", object.name, object.mesh);
            objects.push(object);
        } else if element.has_tag_name("group") {
            let position = parse_vec3(optional_text(&element, "position"), Vec3::ZERO)
                .context("invalid group <position>")?;
            let rotation = parse_vec3(optional_text(&element, "rotation"), Vec3::ZERO)
                .context("invalid group <rotation>")?;
            let scale = parse_vec3(optional_text(&element, "scale"), Vec3::ONE)
                .context("invalid group <scale>")?;
            let transform = parent * local_transform(position, rotation, scale);
            parse_objects(&element, transform, objects)?;
        }
    }
    Ok(())
}

fn parse_object(node: &Node<'_, '_>, parent: Mat4) -> Result<SceneObject> {
    let mut object = SceneObject {
        name: required_text(node, "name")?,
        parent,
        ..SceneObject::default()
    };
    let name = object.name.clone();
    let context = || format!("invalid object {name}");
    if let Some(mesh) = optional_text(node, "mesh") {
        object.mesh = mesh;
    }
    object.color = parse_color(optional_text(node, "color"), object.color).with_context(context)?;
    object.position =
        parse_vec3(optional_text(node, "position"), object.position).with_context(context)?;
    object.rotation =
        parse_vec3(optional_text(node, "rotation"), object.rotation).with_context(context)?;
    object.scale = parse_vec3(optional_text(node, "scale"), object.scale).with_context(context)?;
    Ok(object)
}

fn child<'a, 'input>(node: &Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|c| c.has_tag_name(tag))
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String> {
    optional_text(node, tag).ok_or_else(|| anyhow!("<{tag}> tag is missing"))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_components(value: &str) -> Result<Vec<f32>> {
    value
        .split_whitespace()
        .map(|component| {
            component
                .parse::<f32>()
                .map_err(|err| anyhow!("failed to parse {component:?}: {err}"))
        })
        .collect()
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    match parse_components(&value)?.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(anyhow!("expected 3 components, got {value:?}")),
    }
}

/// RGB or RGBA in 0-1 floats. Alpha defaults to opaque.
fn parse_color(value: Option<String>, default: Vec4) -> Result<Vec4> {
    let Some(value) = value else {
        return Ok(default);
    };
    match parse_components(&value)?.as_slice() {
        [r, g, b] => Ok(Vec4::new(*r, *g, *b, 1.0)),
        [r, g, b, a] => Ok(Vec4::new(*r, *g, *b, *a)),
        _ => Err(anyhow!("color needs 3 or 4 components, got {value:?}")),
    }
}

fn parse_f32(value: Option<String>, default: f32) -> Result<f32> {
    match value {
        Some(value) => value
            .parse::<f32>()
            .map_err(|err| anyhow!("failed to parse float: {err}")),
        None => Ok(default),
    }
}

fn parse_bool(value: Option<String>, default: bool) -> Result<bool> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes" | "on") => Ok(true),
        Some("false" | "0" | "no" | "off") => Ok(false),
        Some(other) => Err(anyhow!("failed to parse boolean: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::normal_matrix;

    const SAMPLE: &str = r#"
    <scene>
        <camera>
            <eye>0 10 20</eye>
            <fov>45</fov>
            <aspect>1.5</aspect>
        </camera>
        <light>
            <mode>point</mode>
            <color>1 0.5 0.25</color>
            <position>0 5 0</position>
            <ambient>0.1 0.1 0.1</ambient>
        </light>
        <object>
            <name>Plane</name>
            <color>0 1 0</color>
            <position>0 -2 0</position>
            <scale>40 0.05 40</scale>
        </object>
        <object>
            <name>Body</name>
            <mesh>car.obj</mesh>
            <color>1 0 0 0.5</color>
            <rotation>0 90 0</rotation>
        </object>
    </scene>
    "#;

    #[test]
    fn parse_scene_populates_camera_light_and_objects() {
        let scene = Scene::from_xml(SAMPLE).unwrap();
        assert_eq!(scene.camera.eye, Vec3::new(0.0, 10.0, 20.0));
        assert_eq!(scene.camera.fov_y_degrees, 45.0);
        assert_eq!(scene.camera.far, Camera::default().far);
        assert_eq!(scene.light.mode, LightingMode::Point);
        assert_eq!(scene.light.color, Vec3::new(1.0, 0.5, 0.25));
        assert_eq!(scene.objects.len(), 2);

        let plane = scene.object("Plane").unwrap();
        assert!(plane.uses_builtin_cube());
        assert_eq!(plane.color, Vec4::new(0.0, 1.0, 0.0, 1.0));
        let body = scene.object("Body").unwrap();
        assert_eq!(body.mesh, "car.obj");
        assert_eq!(body.color.w, 0.5);
    }

    #[test]
    fn empty_scene_uses_defaults() {
        let scene = Scene::from_xml("<scene/>").unwrap();
        assert_eq!(scene.camera, Camera::default());
        assert_eq!(scene.light, LightSettings::default());
        assert!(scene.objects.is_empty());
    }

    #[test]
    fn legacy_flags_select_mode() {
        let both =
            "<scene><light><directional>true</directional><point>true</point></light></scene>";
        assert_eq!(Scene::from_xml(both).unwrap().light.mode, LightingMode::Directional);
        let point = "<scene><light><point>true</point></light></scene>";
        assert_eq!(Scene::from_xml(point).unwrap().light.mode, LightingMode::Point);
        let off = "<scene><light><directional>false</directional></light></scene>";
        assert_eq!(Scene::from_xml(off).unwrap().light.mode, LightingMode::Unlit);
    }

    #[test]
    fn light_direction_is_normalized() {
        let xml = "<scene><light><direction>0 0 5</direction></light></scene>";
        assert_eq!(Scene::from_xml(xml).unwrap().light.direction, Vec3::Z);
        let zero = "<scene><light><direction>0 0 0</direction></light></scene>";
        assert!(Scene::from_xml(zero).is_err());
    }

    #[test]
    fn missing_name_is_an_error() {
        let bad = "<scene><object><mesh>cube</mesh></object></scene>";
        assert!(Scene::from_xml(bad).is_err());
    }

    #[test]
    fn malformed_vector_is_an_error() {
        let bad = "<scene><object><name>A</name><position>1 2</position></object></scene>";
        assert!(Scene::from_xml(bad).is_err());
        let bad = "<scene><object><name>A</name><color>1 x 0</color></object></scene>";
        assert!(Scene::from_xml(bad).is_err());
    }

    #[test]
    fn invalid_clip_range_is_an_error() {
        let bad = "<scene><camera><near>10</near><far>5</far></camera></scene>";
        assert!(Scene::from_xml(bad).is_err());
    }

    #[test]
    fn uniforms_carry_light_and_transforms() {
        let scene = Scene::from_xml(SAMPLE).unwrap();
        let plane = scene.object("Plane").unwrap();
        let uniforms = scene.uniforms_for(plane);
        assert_eq!(uniforms.mode, LightingMode::Point);
        assert_eq!(uniforms.light_position, Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(uniforms.ambient_light, Vec3::splat(0.1));
        assert_eq!(uniforms.view, scene.camera.view_matrix());
        let corner = uniforms.model * Vec4::new(0.5, 0.5, 0.5, 1.0);
        assert!(corner.abs_diff_eq(Vec4::new(20.0, -1.975, 20.0, 1.0), 1e-4));
    }

    #[test]
    fn rotation_is_in_degrees() {
        let object = SceneObject {
            rotation: Vec3::new(0.0, 90.0, 0.0),
            ..SceneObject::default()
        };
        let x = object.model_matrix() * Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert!(x.abs_diff_eq(Vec4::new(0.0, 0.0, -1.0, 1.0), 1e-5));
    }

    #[test]
    fn with_mode_overrides_lighting() {
        let scene = Scene::from_xml(SAMPLE).unwrap().with_mode(LightingMode::Unlit);
        let body = scene.object("Body").unwrap();
        assert_eq!(scene.uniforms_for(body).mode, LightingMode::Unlit);
    }

    #[test]
    fn follow_camera_tracks_subject() {
        let xml = r#"
        <scene>
            <camera><mode>follow</mode><subject>Car</subject></camera>
            <object><name>Ground</name></object>
            <object><name>Car</name><position>6 0 -3</position></object>
        </scene>"#;
        let scene = Scene::from_xml(xml).unwrap();
        assert_eq!(scene.camera_mode, CameraMode::Follow);
        let camera = scene.effective_camera();
        assert_eq!(camera.target, Vec3::new(6.0, 0.0, -3.0));
    }

    const CAR: &str = r#"
    <scene>
        <camera><mode>follow</mode><subject>Body</subject></camera>
        <object><name>Ground</name><position>0 -2 0</position></object>
        <group>
            <position>4 0 -2</position>
            <rotation>0 30 0</rotation>
            <object><name>Body</name><scale>3 0.9 1.5</scale></object>
            <group>
                <scale>0.6 0.6 0.2</scale>
                <object>
                    <name>Wheel</name>
                    <position>1.5 -0.8 -3</position>
                    <rotation>0 0 45</rotation>
                </object>
            </group>
        </group>
    </scene>
    "#;

    #[test]
    fn groups_compose_onto_object_transforms() {
        let scene = Scene::from_xml(CAR).unwrap();
        let names: Vec<_> = scene.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["Ground", "Body", "Wheel"]);

        let wheel = scene.object("Wheel").unwrap();
        let expected = Mat4::from_translation(Vec3::new(4.0, 0.0, -2.0))
            * Mat4::from_rotation_y(30f32.to_radians())
            * Mat4::from_scale(Vec3::new(0.6, 0.6, 0.2))
            * Mat4::from_translation(Vec3::new(1.5, -0.8, -3.0))
            * Mat4::from_rotation_z(45f32.to_radians());
        assert!(wheel.model_matrix().abs_diff_eq(expected, 1e-5));

        let uniforms = scene.uniforms_for(wheel);
        assert!(uniforms.normal_matrix.abs_diff_eq(normal_matrix(expected), 1e-4));

        let ground = scene.object("Ground").unwrap();
        assert_eq!(ground.parent, Mat4::IDENTITY);
    }

    #[test]
    fn camera_follows_grouped_subject_in_world_space() {
        let scene = Scene::from_xml(CAR).unwrap();
        let body = scene.object("Body").unwrap();
        assert!(body.world_position().abs_diff_eq(Vec3::new(4.0, 0.0, -2.0), 1e-6));
        assert!((body.world_yaw_degrees() - 30.0).abs() < 1e-4);
        assert!(scene
            .effective_camera()
            .target
            .abs_diff_eq(Vec3::new(4.0, 0.0, -2.0), 1e-6));
    }

    #[test]
    fn camera_errors_name_the_tag() {
        let bad = "<scene><camera><fov>wide</fov></camera></scene>";
        let err = Scene::from_xml(bad).unwrap_err();
        assert!(format!("{err:#}").contains("invalid <fov>"), "{err:#}");
        let bad = "<scene><camera><far>x</far></camera></scene>";
        let err = Scene::from_xml(bad).unwrap_err();
        assert!(format!("{err:#}").contains("invalid <far>"), "{err:#}");
    }

    #[test]
    fn non_positive_aspect_is_an_error() {
        for aspect in ["0", "-1.5"] {
            let bad = format!("<scene><camera><aspect>{aspect}</aspect></camera></scene>");
            let err = Scene::from_xml(&bad).unwrap_err();
            assert!(format!("{err:#}").contains("aspect"), "{err:#}");
        }
    }

    #[test]
    fn zero_direction_is_ignored_without_directional_light() {
        for mode in ["point", "unlit"] {
            let xml = format!(
                "<scene><light><mode>{mode}</mode><direction>0 0 0</direction></light></scene>"
            );
            let scene = Scene::from_xml(&xml).unwrap();
            assert_eq!(scene.light.direction, LightSettings::default().direction);
        }
        let xml = "<scene><light><mode>directional</mode><direction>0 0 0</direction></light></scene>";
        assert!(Scene::from_xml(xml).is_err());
    }

    #[test]
    fn moving_camera_without_objects_stays_static() {
        let xml = "<scene><camera><mode>first_person</mode></camera></scene>";
        let scene = Scene::from_xml(xml).unwrap();
        assert_eq!(scene.effective_camera(), scene.camera);
    }
}
