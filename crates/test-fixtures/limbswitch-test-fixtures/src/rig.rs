//! Planar two-bone limb that behaves like the host's rig network.
//!
//! Everything lives in the XY plane and rotates about Z. The FK chain is
//! driven by local angles, the IK chain by a hand control and a pole, solved
//! with the law of cosines after the soft-stretch network has scaled the
//! bones. Match joints are read-only proxies of either chain. Authored
//! attributes, list literals, connections and undo chunks live in an inner
//! [`MemoryScene`].
//!
//! An auto clavicle parents both chains and follows whichever one drives the
//! limb by [`CLAVICLE_FOLLOW`]: the shoulder FK angle in FK, the hand heading
//! in IK. Posing the FK chain or flipping the mode therefore moves it, and
//! only a clavicle write puts it back.

use hashbrown::HashMap;

use limbswitch_scene_core::{
    compose_matrix, matrix_translation, Mat4, MemoryScene, NodePath, Plug, SceneError, SceneGraph,
    SceneResult, Scope, Vec3,
};

/// Node names of one limb archetype, namespace excluded.
#[derive(Debug, Clone, Copy)]
pub struct LimbNames {
    pub param: &'static str,
    pub fk: [&'static str; 4],
    pub ik: [&'static str; 4],
    pub fk_match: [&'static str; 3],
    pub ik_match: [&'static str; 3],
    pub pole_match: &'static str,
    pub clavicle: &'static str,
    pub foot: Option<FootNames>,
}

#[derive(Debug, Clone, Copy)]
pub struct FootNames {
    pub fk: &'static str,
    pub pivots: [&'static str; 3],
}

pub const ARM: LimbNames = LimbNames {
    param: "l_arm_param",
    fk: ["l_shoulder_fk", "l_elbow_fk", "l_wrist_fk", "l_wrist_gimbal"],
    ik: ["l_arm_pv", "l_arm_ik", "l_arm_ik_gimbal", "l_arm_ik_pivot"],
    fk_match: ["l_shoulder_fk_match", "l_elbow_fk_match", "l_wrist_fk_match"],
    ik_match: ["l_shoulder_ik_match", "l_elbow_ik_match", "l_wrist_ik_match"],
    pole_match: "l_arm_pv_match",
    clavicle: "l_clav",
    foot: None,
};

pub const LEG: LimbNames = LimbNames {
    param: "l_leg_param",
    fk: ["l_hip_fk", "l_knee_fk", "l_ankle_fk", "l_ankle_gimbal"],
    ik: ["l_leg_pv", "l_leg_ik", "l_leg_ik_gimbal", "l_leg_ik_pivot"],
    fk_match: ["l_hip_fk_match", "l_knee_fk_match", "l_ankle_fk_match"],
    ik_match: ["l_hip_ik_match", "l_knee_ik_match", "l_ankle_ik_match"],
    pole_match: "l_leg_pv_match",
    clavicle: "l_pelvis",
    foot: Some(FootNames {
        fk: "l_foot_fk",
        pivots: ["l_heel_pivot", "l_toe_pivot", "l_ball_pivot"],
    }),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Fk(usize),
    FkGimbal,
    Pole,
    Hand,
    IkGimbal,
    IkPivot,
    FkMatch(usize),
    IkMatch(usize),
    PoleMatch,
    Clavicle,
    FootFk,
    FootPivot,
}

const CLAVICLE_LENGTH: f64 = 2.0;
/// Share of the driving chain's angle the auto clavicle picks up.
pub const CLAVICLE_FOLLOW: f64 = 0.25;
const MIN_SOFT: f64 = 0.001;

fn dir(degrees: f64) -> Vec3 {
    let r = degrees.to_radians();
    Vec3::new(r.cos(), r.sin(), 0.0)
}

fn heading(v: &Vec3) -> f64 {
    v.y.atan2(v.x).to_degrees()
}

fn wrap(degrees: f64) -> f64 {
    let w = degrees.rem_euclid(360.0);
    if w > 180.0 {
        w - 360.0
    } else {
        w
    }
}

/// Z angle of a world matrix.
fn planar_angle(m: &Mat4) -> f64 {
    m[(1, 0)].atan2(m[(0, 0)]).to_degrees()
}

struct IkSolution {
    root: Vec3,
    elbow: Vec3,
    wrist: Vec3,
    upper: f64,
    lower: f64,
}

pub struct PlanarRig {
    pub upper: f64,
    pub lower: f64,
    names: LimbNames,
    scope: Scope,
    roles: HashMap<NodePath, Role>,
    param: NodePath,
    store: MemoryScene,
    fk_angles: [f64; 3],
    fk_gimbal: f64,
    hand: Vec3,
    hand_angle: f64,
    ik_gimbal: f64,
    pole: Vec3,
    pivot_translate: Vec3,
    pivot_rotate: Vec3,
    pole_match: Vec3,
    /// Own rotation of the auto clavicle, before the follow term.
    clavicle: Option<f64>,
    clavicle_writes: usize,
    foot: Option<f64>,
}

fn list_literal(names: &[&str]) -> String {
    let quoted: Vec<String> = names.iter().map(|n| format!("'{n}'")).collect();
    format!("[{}]", quoted.join(", "))
}

impl PlanarRig {
    /// Arm with 5/5 bones, posed in FK, `ikfk_switch` matching `ikfk`.
    pub fn arm(namespace: &str) -> Self {
        Self::build(namespace, ARM)
    }

    /// Leg with 5/5 bones and a foot: FK control plus a pivot hierarchy.
    pub fn leg(namespace: &str) -> Self {
        Self::build(namespace, LEG)
    }

    fn build(namespace: &str, names: LimbNames) -> Self {
        let scope = Scope::from_prefix(namespace).expect("rig namespace should be valid");
        let param = scope.resolve(names.param).expect("static rig name");
        let mut rig = PlanarRig {
            upper: 5.0,
            lower: 5.0,
            names,
            scope,
            roles: HashMap::new(),
            param: param.clone(),
            store: MemoryScene::new(),
            fk_angles: [10.0, -40.0, 15.0],
            fk_gimbal: 0.0,
            hand: Vec3::new(9.0, 0.0, 0.0),
            hand_angle: 0.0,
            ik_gimbal: 0.0,
            pole: Vec3::new(5.0, 10.0, 0.0),
            pivot_translate: Vec3::zeros(),
            pivot_rotate: Vec3::zeros(),
            pole_match: Vec3::new(5.0, 10.0, 0.0),
            clavicle: None,
            clavicle_writes: 0,
            foot: None,
        };

        for (i, name) in names.fk.iter().take(3).enumerate() {
            rig.add_role(name, Role::Fk(i));
        }
        rig.add_role(names.fk[3], Role::FkGimbal);
        rig.add_role(names.ik[0], Role::Pole);
        rig.add_role(names.ik[1], Role::Hand);
        rig.add_role(names.ik[2], Role::IkGimbal);
        rig.add_role(names.ik[3], Role::IkPivot);
        for i in 0..3 {
            rig.add_role(names.fk_match[i], Role::FkMatch(i));
            rig.add_role(names.ik_match[i], Role::IkMatch(i));
        }
        rig.add_role(names.pole_match, Role::PoleMatch);

        let p = |attr: &str| param.plug(attr);
        for (attr, value) in [
            ("ikfk", 1.0),
            ("ikfk_switch", 1.0),
            ("stretch", 1.0),
            ("stretchTop", 1.0),
            ("stretchBottom", 1.0),
            ("softStretch", 0.1),
            ("pvPin", 0.5),
            ("twist", 3.0),
        ] {
            rig.store.add_attribute(p(attr), value, true);
        }
        rig.store.add_text(p("fkControls"), list_literal(&names.fk));
        rig.store.add_text(p("ikControls"), list_literal(&names.ik));
        rig.store.add_text(p("fkMatchTransforms"), list_literal(&names.fk_match));
        rig.store.add_text(p("ikMatchTransforms"), list_literal(&names.ik_match));
        rig.store.add_text(p("pvMatch"), names.pole_match);

        if let Some(foot) = names.foot {
            rig.foot = Some(0.0);
            rig.add_role(foot.fk, Role::FootFk);
            rig.store.add_text(p("footFkControl"), format!("'{}'", foot.fk));
            rig.store.add_text(p("footIkControls"), list_literal(&foot.pivots));
            let values: [&[(&str, f64)]; 3] = [
                &[("rz", 12.0), ("heelRoll", 5.0)],
                &[("rz", -4.0), ("toeTap", 2.0)],
                &[("rz", 3.0), ("bank", -1.5)],
            ];
            for (name, attrs) in foot.pivots.iter().zip(values) {
                rig.add_role(name, Role::FootPivot);
                let node = rig.node(name);
                for (attr, value) in attrs {
                    rig.store.add_attribute(node.plug(*attr), *value, true);
                }
                rig.store.add_attribute(node.plug("visibility"), 1.0, false);
            }
        }
        rig
    }

    fn add_role(&mut self, name: &str, role: Role) {
        let node = self.node(name);
        self.roles.insert(node, role);
    }

    /// Parent both chains under an auto clavicle whose world angle is
    /// currently `angle` degrees.
    pub fn with_auto_clavicle(mut self, angle: f64) -> Self {
        self.clavicle = Some(angle - CLAVICLE_FOLLOW * self.clavicle_follow());
        self.add_role(self.names.clavicle, Role::Clavicle);
        let p = |attr: &str| self.param.plug(attr);
        let (auto, ctrl) = (p("autoClav"), p("clavicleCtrl"));
        self.store.add_attribute(auto, 1.0, true);
        self.store.add_text(ctrl, self.names.clavicle);
        self
    }

    /// Drop the authored pole match node.
    pub fn without_pole_match(mut self) -> Self {
        let node = self.node(self.names.pole_match);
        self.roles.remove(&node);
        let plug = self.param.plug("pvMatch");
        self.store.remove_attribute(&plug);
        self
    }

    /// Scoped node path of a rig name.
    pub fn node(&self, name: &str) -> NodePath {
        self.scope.resolve(name).expect("static rig name")
    }

    pub fn names(&self) -> &LimbNames {
        &self.names
    }

    pub fn param(&self) -> &NodePath {
        &self.param
    }

    pub fn store(&self) -> &MemoryScene {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut MemoryScene {
        &mut self.store
    }

    pub fn fk_angles(&self) -> [f64; 3] {
        self.fk_angles
    }

    pub fn fk_gimbal(&self) -> f64 {
        self.fk_gimbal
    }

    /// Local translate and rotate of the IK pivot control.
    pub fn ik_pivot(&self) -> (Vec3, Vec3) {
        (self.pivot_translate, self.pivot_rotate)
    }

    /// Hand control position, world angle and gimbal angle.
    pub fn ik_hand(&self) -> (Vec3, f64, f64) {
        (self.hand, self.hand_angle, self.ik_gimbal)
    }

    pub fn set_ik_pivot(&mut self, translate: Vec3, rotate: Vec3) {
        self.pivot_translate = translate;
        self.pivot_rotate = rotate;
    }

    /// World angle of the auto clavicle.
    pub fn clavicle_angle(&self) -> Option<f64> {
        self.clavicle.map(|_| self.parent_angle())
    }

    /// Rotation writes the clavicle received so far.
    pub fn clavicle_writes(&self) -> usize {
        self.clavicle_writes
    }

    pub fn set_fk_pose(&mut self, angles: [f64; 3], gimbal: f64) {
        self.fk_angles = angles;
        self.fk_gimbal = gimbal;
    }

    /// Read a param-node channel, `default` when absent.
    pub fn param_value(&self, attr: &str, default: f64) -> f64 {
        self.store.attribute(&self.param.plug(attr)).unwrap_or(default)
    }

    pub fn set_param_value(&mut self, attr: &str, value: f64) -> SceneResult<()> {
        let plug = self.param.plug(attr);
        self.store.set_attribute(&plug, value)
    }

    /// A settings node whose `ikfk` feeds this rig's param node.
    pub fn add_proxy_param(&mut self, name: &str) -> NodePath {
        let proxy = self.node(name);
        self.store.add_attribute(proxy.plug("ikfk"), 0.0, true);
        self.store.connect(proxy.plug("ikfk"), self.param.clone());
        proxy
    }

    fn is_fk(&self) -> bool {
        self.param_value("ikfk", 1.0) >= 0.5
    }

    /// Angle of the driving chain the clavicle follows.
    fn clavicle_follow(&self) -> f64 {
        if self.is_fk() {
            self.fk_angles[0]
        } else {
            heading(&self.hand)
        }
    }

    fn parent_angle(&self) -> f64 {
        match self.clavicle {
            Some(own) => own + CLAVICLE_FOLLOW * self.clavicle_follow(),
            None => 0.0,
        }
    }

    fn set_clavicle(&mut self, own: f64) {
        self.clavicle = Some(own);
        self.clavicle_writes += 1;
    }

    fn root(&self) -> Vec3 {
        match self.clavicle {
            Some(_) => dir(self.parent_angle()) * CLAVICLE_LENGTH,
            None => Vec3::zeros(),
        }
    }

    fn stretch(&self) -> (f64, f64) {
        (
            self.param_value("stretchTop", 1.0),
            self.param_value("stretchBottom", 1.0),
        )
    }

    /// World angles of the three FK controls and the gimbal.
    fn fk_world(&self) -> [f64; 4] {
        let w1 = self.parent_angle() + self.fk_angles[0];
        let w2 = w1 + self.fk_angles[1];
        let w3 = w2 + self.fk_angles[2];
        [w1, w2, w3, w3 + self.fk_gimbal]
    }

    fn fk_positions(&self) -> [Vec3; 3] {
        let [w1, w2, ..] = self.fk_world();
        let (top, bottom) = self.stretch();
        let root = self.root();
        let mid = root + dir(w1) * (self.upper * top);
        let end = mid + dir(w2) * (self.lower * bottom);
        [root, mid, end]
    }

    /// Segment lengths the stretch network drives for distance `d`.
    fn soft_lengths(&self, d: f64) -> (f64, f64) {
        let (top, bottom) = self.stretch();
        let dial = self.param_value("stretch", 1.0).clamp(0.0, 1.0);
        let p = self.param_value("softStretch", 0.1).max(MIN_SOFT);
        let max_len = (self.upper * top + self.lower * bottom).abs();
        let soft_dist = max_len - p;
        let factor = if d > soft_dist {
            let short = max_len - p * (-(d - soft_dist) / p).exp();
            if short > f64::EPSILON {
                d / short
            } else {
                1.0
            }
        } else {
            1.0
        };
        let blended = 1.0 + dial * (factor - 1.0);
        ((self.upper * top).abs() * blended, (self.lower * bottom).abs() * blended)
    }

    fn ik(&self) -> IkSolution {
        let root = self.root();
        let to_hand = self.hand - root;
        let d = to_hand.norm();
        let u = if d > f64::EPSILON {
            to_hand / d
        } else {
            Vec3::x()
        };
        let (a, b) = self.soft_lengths(d);

        let elbow = if d <= f64::EPSILON || d >= a + b {
            root + u * a
        } else {
            let cos = ((a * a + d * d - b * b) / (2.0 * a * d)).clamp(-1.0, 1.0);
            let to_pole = self.pole - root;
            let side = u.x * to_pole.y - u.y * to_pole.x;
            let alpha = if side < 0.0 { -cos.acos() } else { cos.acos() };
            root + dir(heading(&u) + alpha.to_degrees()) * a
        };
        let reach = self.hand - elbow;
        let wrist = if reach.norm() > f64::EPSILON {
            elbow + reach.normalize() * b
        } else {
            elbow + u * b
        };
        IkSolution {
            root,
            elbow,
            wrist,
            upper: a,
            lower: b,
        }
    }

    fn role(&self, node: &NodePath) -> SceneResult<Role> {
        self.roles
            .get(node)
            .copied()
            .ok_or_else(|| SceneError::NodeNotFound(node.clone()))
    }

    /// World position and Z angle of a transform role.
    fn pose(&self, role: Role) -> (Vec3, f64) {
        let fk = self.fk_positions();
        let [w1, w2, w3, wg] = self.fk_world();
        match role {
            Role::Fk(0) | Role::FkMatch(0) => (fk[0], w1),
            Role::Fk(1) | Role::FkMatch(1) => (fk[1], w2),
            Role::Fk(_) => (fk[2], w3),
            Role::FkMatch(_) | Role::FkGimbal => (fk[2], wg),
            Role::FootFk => (fk[2], wg + self.foot.unwrap_or(0.0)),
            Role::Clavicle => (Vec3::zeros(), self.parent_angle()),
            Role::Hand | Role::IkPivot | Role::FootPivot => (self.hand, self.hand_angle),
            Role::IkGimbal => (self.hand, self.hand_angle + self.ik_gimbal),
            Role::Pole => (self.pole, 0.0),
            Role::PoleMatch => (self.pole_match, 0.0),
            Role::IkMatch(i) => {
                let s = self.ik();
                match i {
                    0 => (s.root, heading(&(s.elbow - s.root))),
                    1 => (s.elbow, heading(&(s.wrist - s.elbow))),
                    _ => (s.wrist, self.hand_angle + self.ik_gimbal),
                }
            }
        }
    }

    fn set_world_angle(&mut self, node: &NodePath, role: Role, z: f64) -> SceneResult<()> {
        let [w1, w2, w3, wg] = self.fk_world();
        match role {
            Role::Fk(0) => self.fk_angles[0] = z - self.parent_angle(),
            Role::Fk(1) => self.fk_angles[1] = z - w1,
            Role::Fk(_) => self.fk_angles[2] = z - w2,
            Role::FkGimbal => self.fk_gimbal = z - w3,
            Role::FootFk => self.foot = Some(z - wg),
            Role::Hand => self.hand_angle = z,
            Role::Clavicle => {
                let own = z - CLAVICLE_FOLLOW * self.clavicle_follow();
                self.set_clavicle(own);
            }
            _ => return Err(unsupported(node, "set_world_rotation")),
        }
        Ok(())
    }
}

fn unsupported(node: &NodePath, op: &'static str) -> SceneError {
    SceneError::Unsupported {
        node: node.clone(),
        op,
    }
}

impl SceneGraph for PlanarRig {
    fn exists(&self, node: &NodePath) -> bool {
        self.roles.contains_key(node) || self.store.exists(node)
    }

    fn has_attribute(&self, plug: &Plug) -> bool {
        self.store.has_attribute(plug)
    }

    fn world_position(&self, node: &NodePath) -> SceneResult<Vec3> {
        Ok(self.pose(self.role(node)?).0)
    }

    fn set_world_position(&mut self, node: &NodePath, position: Vec3) -> SceneResult<()> {
        match self.role(node)? {
            Role::Pole => self.pole = position,
            Role::PoleMatch => self.pole_match = position,
            Role::Hand => self.hand = position,
            _ => return Err(unsupported(node, "set_world_position")),
        }
        Ok(())
    }

    fn world_rotation(&self, node: &NodePath) -> SceneResult<Vec3> {
        let (_, angle) = self.pose(self.role(node)?);
        Ok(Vec3::new(0.0, 0.0, wrap(angle)))
    }

    fn set_world_rotation(&mut self, node: &NodePath, degrees: Vec3) -> SceneResult<()> {
        let role = self.role(node)?;
        self.set_world_angle(node, role, degrees.z)
    }

    fn world_matrix(&self, node: &NodePath) -> SceneResult<Mat4> {
        let (position, angle) = self.pose(self.role(node)?);
        Ok(compose_matrix(position, Vec3::new(0.0, 0.0, wrap(angle))))
    }

    fn set_world_matrix(&mut self, node: &NodePath, matrix: Mat4) -> SceneResult<()> {
        let role = self.role(node)?;
        match role {
            Role::Hand => self.hand = matrix_translation(&matrix),
            Role::Pole => {
                self.pole = matrix_translation(&matrix);
                return Ok(());
            }
            _ => {}
        }
        self.set_world_angle(node, role, planar_angle(&matrix))
    }

    fn local_translation(&self, node: &NodePath) -> SceneResult<Vec3> {
        let (top, bottom) = self.stretch();
        Ok(match self.role(node)? {
            Role::Fk(1) => Vec3::new(self.upper, 0.0, 0.0),
            Role::Fk(2) => Vec3::new(self.lower, 0.0, 0.0),
            Role::FkMatch(1) => Vec3::new(self.upper * top, 0.0, 0.0),
            Role::FkMatch(2) => Vec3::new(self.lower * bottom, 0.0, 0.0),
            Role::IkMatch(1) => Vec3::new(self.ik().upper, 0.0, 0.0),
            Role::IkMatch(2) => Vec3::new(self.ik().lower, 0.0, 0.0),
            Role::IkPivot => self.pivot_translate,
            _ => Vec3::zeros(),
        })
    }

    fn set_local_translation(&mut self, node: &NodePath, value: Vec3) -> SceneResult<()> {
        match self.role(node)? {
            Role::IkPivot => self.pivot_translate = value,
            _ => return Err(unsupported(node, "set_local_translation")),
        }
        Ok(())
    }

    fn set_local_rotation(&mut self, node: &NodePath, degrees: Vec3) -> SceneResult<()> {
        match self.role(node)? {
            Role::Fk(i) => self.fk_angles[i.min(2)] = degrees.z,
            Role::FkGimbal => self.fk_gimbal = degrees.z,
            Role::IkGimbal => self.ik_gimbal = degrees.z,
            Role::IkPivot => self.pivot_rotate = degrees,
            Role::Clavicle => self.set_clavicle(degrees.z),
            Role::FootFk => self.foot = Some(degrees.z),
            _ => return Err(unsupported(node, "set_local_rotation")),
        }
        Ok(())
    }

    fn local_scale(&self, node: &NodePath) -> SceneResult<Vec3> {
        Ok(match self.role(node)? {
            Role::IkMatch(0) => Vec3::new(self.ik().upper / self.upper, 1.0, 1.0),
            Role::IkMatch(1) => Vec3::new(self.ik().lower / self.lower, 1.0, 1.0),
            _ => Vec3::new(1.0, 1.0, 1.0),
        })
    }

    fn attribute(&self, plug: &Plug) -> SceneResult<f64> {
        self.store.attribute(plug)
    }

    fn set_attribute(&mut self, plug: &Plug, value: f64) -> SceneResult<()> {
        self.store.set_attribute(plug, value)
    }

    fn text_attribute(&self, plug: &Plug) -> SceneResult<String> {
        self.store.text_attribute(plug)
    }

    fn keyable_attributes(&self, node: &NodePath) -> SceneResult<Vec<String>> {
        self.store.keyable_attributes(node)
    }

    fn connections(&self, plug: &Plug) -> SceneResult<Vec<NodePath>> {
        self.store.connections(plug)
    }

    fn open_undo_chunk(&mut self) {
        self.store.open_undo_chunk();
    }

    fn close_undo_chunk(&mut self) {
        self.store.close_undo_chunk();
    }
}
