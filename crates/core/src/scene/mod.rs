use std::collections::BTreeMap;

use crate::{
    rig::{Rig, TargetId},
    timeline::{KeyframeLog, KeyframeRecord, Timeline},
};

/// Host scene graph as seen by the streaming core.
pub trait SceneGraph {
    /// Copy of the currently selected targets. Later selection changes do not
    /// alter a snapshot that was already taken.
    fn selected_targets(&self) -> Vec<TargetId>;

    fn target_mut(&mut self, id: &TargetId) -> Option<&mut dyn Rig>;
}

/// Everything a session needs from the hosting application.
pub trait Host: SceneGraph + Timeline {}

impl<T: SceneGraph + Timeline + ?Sized> Host for T {}

/// Scene that owns its rigs and a selection list.
#[derive(Debug, Default)]
pub struct Scene {
    objects: BTreeMap<TargetId, Box<dyn Rig>>,
    selection: Vec<TargetId>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rig, replacing any object with the same id.
    pub fn add(&mut self, rig: impl Rig + 'static) -> TargetId {
        let id = rig.id().clone();
        self.objects.insert(id.clone(), Box::new(rig));
        id
    }

    pub fn remove(&mut self, id: &TargetId) -> Option<Box<dyn Rig>> {
        self.selection.retain(|selected| selected != id);
        self.objects.remove(id)
    }

    /// Replaces the selection, ignoring ids that are not in the scene.
    pub fn select<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = TargetId>,
    {
        self.selection = ids
            .into_iter()
            .filter(|id| self.objects.contains_key(id))
            .collect();
    }

    pub fn select_all(&mut self) {
        self.selection = self.objects.keys().cloned().collect();
    }

    pub fn target(&self, id: &TargetId) -> Option<&dyn Rig> {
        self.objects.get(id).map(|rig| rig.as_ref())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl SceneGraph for Scene {
    fn selected_targets(&self) -> Vec<TargetId> {
        self.selection.clone()
    }

    fn target_mut(&mut self, id: &TargetId) -> Option<&mut dyn Rig> {
        match self.objects.get_mut(id) {
            Some(rig) => Some(rig.as_mut()),
            None => None,
        }
    }
}

/// In-process host made of a [`Scene`] and a [`KeyframeLog`].
#[derive(Debug, Default)]
pub struct StandaloneHost {
    pub scene: Scene,
    pub timeline: KeyframeLog,
}

impl StandaloneHost {
    pub fn new(scene: Scene, timeline: KeyframeLog) -> Self {
        Self { scene, timeline }
    }
}

impl SceneGraph for StandaloneHost {
    fn selected_targets(&self) -> Vec<TargetId> {
        self.scene.selected_targets()
    }

    fn target_mut(&mut self, id: &TargetId) -> Option<&mut dyn Rig> {
        self.scene.target_mut(id)
    }
}

impl Timeline for StandaloneHost {
    fn current_frame(&self) -> i64 {
        self.timeline.current_frame()
    }

    fn insert_keyframe(&mut self, record: KeyframeRecord) {
        self.timeline.insert_keyframe(record);
    }
}
