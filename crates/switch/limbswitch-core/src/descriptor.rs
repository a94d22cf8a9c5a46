//! Which scene nodes play which role for one switchable limb.
//!
//! A [`LimbDescriptor`] is authored data: plain node names plus the namespace
//! prefix of the rig instance. It is read once, either from structured config
//! (JSON) or from the list literals authored on the param node, and resolved
//! into a [`Limb`] whose every reference is a fully scoped [`NodePath`].

use serde::{Deserialize, Serialize};

use limbswitch_scene_core::literal::{parse_name, parse_string_list};
use limbswitch_scene_core::{NodePath, Plug, SceneGraph, Scope};

use crate::attrs;
use crate::converge::StretchChannels;
use crate::error::{DescriptorError, SwitchError, SwitchResult};

/// Root, mid and end joint of a three-joint match chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchChain {
    pub root: String,
    pub mid: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IkControls {
    pub pole: String,
    pub end_effector: String,
    pub gimbal: String,
    pub pivot: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClavicleRef {
    pub control: String,
    /// Only auto clavicles take part in the switch.
    #[serde(default)]
    pub auto: bool,
}

/// Extra roles of the foot/ankle archetype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FootDescriptor {
    /// Foot FK control whose world matrix survives an FK-bound switch.
    pub fk_control: String,
    /// Foot pivot hierarchy, zeroed before an IK-bound switch.
    #[serde(default)]
    pub pivot_chain: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimbDescriptor {
    /// Node carrying the mode flags and stretch channels.
    pub param_node: String,
    /// Namespace prefix shared by every name below, e.g. `"charA:"`.
    #[serde(default)]
    pub namespace: String,
    /// 3 or 4 FK controls; the last one is the wrist/ankle gimbal.
    pub fk_controls: Vec<String>,
    pub ik_controls: IkControls,
    pub fk_match: MatchChain,
    pub ik_match: MatchChain,
    /// Authored pole position used when the FK chain is straight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pole_match: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clavicle: Option<ClavicleRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foot: Option<FootDescriptor>,
}

fn check_name(field: &'static str, name: &str) -> Result<(), DescriptorError> {
    NodePath::parse(name)
        .map(|_| ())
        .map_err(|reason| DescriptorError::BadName { field, reason })
}

fn read_text<S: SceneGraph + ?Sized>(scene: &S, plug: &Plug) -> SwitchResult<String> {
    scene.text_attribute(plug).map_err(|err| SwitchError::Data {
        plug: plug.clone(),
        reason: err.to_string(),
    })
}

fn read_list<S: SceneGraph + ?Sized>(scene: &S, plug: &Plug) -> SwitchResult<Vec<String>> {
    let text = read_text(scene, plug)?;
    parse_string_list(&text).map_err(|err| SwitchError::literal(plug, err))
}

fn read_name<S: SceneGraph + ?Sized>(scene: &S, plug: &Plug) -> SwitchResult<String> {
    let text = read_text(scene, plug)?;
    parse_name(&text).map_err(|err| SwitchError::literal(plug, err))
}

fn expect_len(
    plug: &Plug,
    items: Vec<String>,
    field: &'static str,
    expected: usize,
) -> SwitchResult<Vec<String>> {
    if items.len() < expected {
        return Err(SwitchError::Data {
            plug: plug.clone(),
            reason: DescriptorError::ListLength {
                field,
                expected,
                found: items.len(),
            }
            .to_string(),
        });
    }
    Ok(items)
}

fn match_chain(items: &[String]) -> MatchChain {
    MatchChain {
        root: items[0].clone(),
        mid: items[1].clone(),
        end: items[2].clone(),
    }
}

impl LimbDescriptor {
    /// Structural checks: counts and name syntax.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        check_name("param_node", &self.param_node)?;
        Scope::from_prefix(&self.namespace).map_err(|reason| DescriptorError::BadName {
            field: "namespace",
            reason,
        })?;
        if !(3..=4).contains(&self.fk_controls.len()) {
            return Err(DescriptorError::FkControlCount(self.fk_controls.len()));
        }
        for name in &self.fk_controls {
            check_name("fk_controls", name)?;
        }
        let ik = &self.ik_controls;
        for name in [&ik.pole, &ik.end_effector, &ik.gimbal, &ik.pivot] {
            check_name("ik_controls", name)?;
        }
        for chain in [&self.fk_match, &self.ik_match] {
            for name in [&chain.root, &chain.mid, &chain.end] {
                check_name("match chain", name)?;
            }
        }
        if let Some(pv) = &self.pole_match {
            check_name("pole_match", pv)?;
        }
        if let Some(clav) = &self.clavicle {
            check_name("clavicle", &clav.control)?;
        }
        if let Some(foot) = &self.foot {
            check_name("foot.fk_control", &foot.fk_control)?;
            for name in &foot.pivot_chain {
                check_name("foot.pivot_chain", name)?;
            }
        }
        Ok(())
    }

    /// Read the authored list literals off a param node.
    ///
    /// Missing or malformed lists are [`SwitchError::Data`]; optional roles
    /// (pole match, clavicle, foot) are picked up only when their attributes exist.
    pub fn from_param_node<S: SceneGraph + ?Sized>(scene: &S, param: &NodePath) -> SwitchResult<Self> {
        let plug = |attr: &str| param.plug(attr);

        let fk_controls = read_list(scene, &plug(attrs::FK_CONTROLS))?;

        let ik_plug = plug(attrs::IK_CONTROLS);
        let ik = expect_len(&ik_plug, read_list(scene, &ik_plug)?, "ikControls", 4)?;

        let fk_plug = plug(attrs::FK_MATCH_TRANSFORMS);
        let fk_match = expect_len(&fk_plug, read_list(scene, &fk_plug)?, "fkMatchTransforms", 3)?;

        let ikm_plug = plug(attrs::IK_MATCH_TRANSFORMS);
        let ik_match = expect_len(&ikm_plug, read_list(scene, &ikm_plug)?, "ikMatchTransforms", 3)?;

        let pv_plug = plug(attrs::PV_MATCH);
        let pole_match = if scene.has_attribute(&pv_plug) {
            Some(read_name(scene, &pv_plug)?)
        } else {
            None
        };

        let clavicle = if scene.has_attribute(&plug(attrs::AUTO_CLAV)) {
            Some(ClavicleRef {
                control: read_name(scene, &plug(attrs::CLAVICLE_CTRL))?,
                auto: true,
            })
        } else {
            None
        };

        let foot_fk = plug(attrs::FOOT_FK_CONTROL);
        let foot = if scene.has_attribute(&foot_fk) {
            let pivots = plug(attrs::FOOT_IK_CONTROLS);
            let pivot_chain = if scene.has_attribute(&pivots) {
                read_list(scene, &pivots)?
            } else {
                Vec::new()
            };
            Some(FootDescriptor {
                fk_control: read_name(scene, &foot_fk)?,
                pivot_chain,
            })
        } else {
            None
        };

        let descriptor = LimbDescriptor {
            param_node: param.name.clone(),
            namespace: param.namespace_prefix(),
            fk_controls,
            ik_controls: IkControls {
                pole: ik[0].clone(),
                end_effector: ik[1].clone(),
                gimbal: ik[2].clone(),
                pivot: ik[3].clone(),
            },
            fk_match: match_chain(&fk_match),
            ik_match: match_chain(&ik_match),
            pole_match,
            clavicle,
            foot,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Scope every reference once.
    pub fn resolve(&self) -> Result<Limb, DescriptorError> {
        self.validate()?;
        let scope = Scope::from_prefix(&self.namespace).map_err(|reason| DescriptorError::BadName {
            field: "namespace",
            reason,
        })?;
        let r = |field: &'static str, name: &str| {
            scope
                .resolve(name)
                .map_err(|reason| DescriptorError::BadName { field, reason })
        };
        let chain = |field: &'static str, c: &MatchChain| -> Result<[NodePath; 3], DescriptorError> {
            Ok([r(field, &c.root)?, r(field, &c.mid)?, r(field, &c.end)?])
        };

        let mut fk_controls = self
            .fk_controls
            .iter()
            .map(|n| r("fk_controls", n))
            .collect::<Result<Vec<_>, _>>()?;
        // validate() guarantees at least three entries
        let fk_gimbal = fk_controls.pop().ok_or(DescriptorError::FkControlCount(0))?;

        let clavicle = match &self.clavicle {
            Some(c) if c.auto => Some(r("clavicle", &c.control)?),
            _ => None,
        };
        let foot = match &self.foot {
            Some(f) => Some(FootRoles {
                fk_control: r("foot.fk_control", &f.fk_control)?,
                pivot_chain: f
                    .pivot_chain
                    .iter()
                    .map(|n| r("foot.pivot_chain", n))
                    .collect::<Result<Vec<_>, _>>()?,
            }),
            None => None,
        };

        Ok(Limb {
            param: r("param_node", &self.param_node)?,
            fk_controls,
            fk_gimbal,
            ik: IkRoles {
                pole: r("ik_controls", &self.ik_controls.pole)?,
                end_effector: r("ik_controls", &self.ik_controls.end_effector)?,
                gimbal: r("ik_controls", &self.ik_controls.gimbal)?,
                pivot: r("ik_controls", &self.ik_controls.pivot)?,
            },
            fk_match: chain("fk_match", &self.fk_match)?,
            ik_match: chain("ik_match", &self.ik_match)?,
            pole_match: self
                .pole_match
                .as_deref()
                .map(|n| r("pole_match", n))
                .transpose()?,
            clavicle,
            foot,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IkRoles {
    pub pole: NodePath,
    pub end_effector: NodePath,
    pub gimbal: NodePath,
    pub pivot: NodePath,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FootRoles {
    pub fk_control: NodePath,
    pub pivot_chain: Vec<NodePath>,
}

/// A resolved limb: every role is a scoped node path.
#[derive(Debug, Clone, PartialEq)]
pub struct Limb {
    pub param: NodePath,
    /// FK controls driven by the match rotations (gimbal excluded).
    pub fk_controls: Vec<NodePath>,
    pub fk_gimbal: NodePath,
    pub ik: IkRoles,
    pub fk_match: [NodePath; 3],
    pub ik_match: [NodePath; 3],
    pub pole_match: Option<NodePath>,
    /// Present only for auto clavicles.
    pub clavicle: Option<NodePath>,
    pub foot: Option<FootRoles>,
}

impl Limb {
    #[inline]
    pub fn param_plug(&self, attr: &str) -> Plug {
        self.param.plug(attr)
    }

    /// Current mode flag.
    pub fn mode_plug(&self) -> Plug {
        self.param_plug(attrs::IKFK)
    }

    /// Requested mode; the trigger plug.
    pub fn switch_plug(&self) -> Plug {
        self.param_plug(attrs::IKFK_SWITCH)
    }

    pub fn stretch_channels(&self) -> StretchChannels {
        StretchChannels {
            top: self.param_plug(attrs::STRETCH_TOP),
            bottom: self.param_plug(attrs::STRETCH_BOTTOM),
        }
    }

    /// FK control standing in for the elbow/knee.
    pub fn fk_mid_control(&self) -> &NodePath {
        &self.fk_controls[1]
    }
}
