//! Limbs registered at rig load, keyed by their `ikfk_switch` trigger plug.

use hashbrown::HashMap;

use limbswitch_scene_core::{NodePath, Plug, SceneGraph};

use crate::attrs;
use crate::config::SwitchConfig;
use crate::descriptor::{Limb, LimbDescriptor};
use crate::entry::{run_switch, LimbArchetype, SwitchOutcome};
use crate::error::{ErrorChain, SwitchError, SwitchResult};

#[derive(Debug, Clone)]
pub struct Registration {
    pub limb: Limb,
    pub archetype: LimbArchetype,
}

#[derive(Debug, Default)]
pub struct SwitchRegistry {
    limbs: HashMap<Plug, Registration>,
    config: SwitchConfig,
}

impl SwitchRegistry {
    pub fn new(config: SwitchConfig) -> Self {
        Self {
            limbs: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &SwitchConfig {
        &self.config
    }

    /// Resolve and store a limb. Re-registering the same trigger replaces it.
    pub fn register(&mut self, descriptor: &LimbDescriptor, archetype: LimbArchetype) -> SwitchResult<Plug> {
        let limb = descriptor.resolve()?;
        let trigger = limb.switch_plug();
        if self
            .limbs
            .insert(trigger.clone(), Registration { limb, archetype })
            .is_some()
        {
            log::debug!("replaced limb registered on '{trigger}'");
        }
        Ok(trigger)
    }

    /// Read the authored descriptor off `param` and register it; limbs with
    /// foot controls register as legs.
    pub fn register_from_scene<S: SceneGraph + ?Sized>(
        &mut self,
        scene: &S,
        param: &NodePath,
    ) -> SwitchResult<Plug> {
        let descriptor = LimbDescriptor::from_param_node(scene, param)?;
        let archetype = archetype_of(&descriptor);
        self.register(&descriptor, archetype)
    }

    pub fn unregister(&mut self, trigger: &Plug) -> bool {
        self.limbs.remove(trigger).is_some()
    }

    pub fn get(&self, trigger: &Plug) -> Option<&Registration> {
        self.limbs.get(trigger)
    }

    pub fn triggers(&self) -> impl Iterator<Item = &Plug> {
        self.limbs.keys()
    }

    pub fn len(&self) -> usize {
        self.limbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limbs.is_empty()
    }

    /// Attribute-change hook. `None` when `plug` is not a registered trigger.
    pub fn on_attribute_changed<S: SceneGraph + ?Sized>(&self, scene: &mut S, plug: &Plug) -> Option<SwitchOutcome> {
        let reg = self.limbs.get(plug)?;
        Some(run_switch(scene, &reg.limb, reg.archetype, &self.config))
    }

    /// Switch the limb owning `param`. A param node whose `ikfk` drives exactly
    /// one other node hands the switch over to that node. Unregistered limbs
    /// are read from the scene on the spot.
    pub fn switch_param<S: SceneGraph + ?Sized>(&self, scene: &mut S, param: &NodePath) -> SwitchOutcome {
        let param = match redirect(scene, param) {
            Ok(param) => param,
            Err(err) => {
                log::error!("ikfk switch on '{param}' failed: {}", ErrorChain(&err));
                return SwitchOutcome::Failed(err);
            }
        };
        if let Some(reg) = self.limbs.get(&param.plug(attrs::IKFK_SWITCH)) {
            return run_switch(scene, &reg.limb, reg.archetype, &self.config);
        }

        let resolved = LimbDescriptor::from_param_node(scene, &param)
            .and_then(|d| Ok((d.resolve()?, archetype_of(&d))));
        match resolved {
            Ok((limb, archetype)) => run_switch(scene, &limb, archetype, &self.config),
            Err(err) => {
                log::error!("ikfk switch on '{param}' failed: {}", ErrorChain(&err));
                SwitchOutcome::Failed(err)
            }
        }
    }
}

fn archetype_of(descriptor: &LimbDescriptor) -> LimbArchetype {
    if descriptor.foot.is_some() {
        LimbArchetype::Leg
    } else {
        LimbArchetype::Arm
    }
}

fn redirect<S: SceneGraph + ?Sized>(scene: &S, param: &NodePath) -> Result<NodePath, SwitchError> {
    let mut targets = scene.connections(&param.plug(attrs::IKFK))?;
    if targets.len() == 1 {
        if let Some(target) = targets.pop() {
            log::debug!("'{param}' forwards its switch to '{target}'");
            return Ok(target);
        }
    }
    Ok(param.clone())
}
