//! `bevy_ecs` scene host

use bevy_ecs::prelude::*;
use glam::Mat4;

use crate::backend::{BackendResult, GraphicsBackend};
use crate::scene::{SceneHost, Transform, VirtualCamera};

/// Whether an entity is drawn by scene renders.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visibility(pub bool);

impl Default for Visibility {
    fn default() -> Self {
        Self(true)
    }
}

impl Visibility {
    pub fn is_visible(&self) -> bool {
        self.0
    }
}

/// Adapts a [`World`] to [`SceneHost`].
///
/// Nodes are entities carrying [`Transform`] (treated as the world
/// transform) and optionally [`Visibility`]. Drawing is delegated to
/// `draw`, which receives the world so it can query visible entities.
pub struct WorldScene<'w, F> {
    world: &'w mut World,
    draw: F,
}

impl<'w, F> WorldScene<'w, F> {
    pub fn new(world: &'w mut World, draw: F) -> Self {
        Self { world, draw }
    }

    pub fn world(&self) -> &World {
        self.world
    }
}

impl<'w, B, F> SceneHost<B> for WorldScene<'w, F>
where
    B: GraphicsBackend,
    F: FnMut(&mut World, &mut B, &VirtualCamera) -> BackendResult<()>,
{
    type Node = Entity;

    fn world_matrix(&self, node: Entity) -> Option<Mat4> {
        self.world.get::<Transform>(node).map(Transform::matrix)
    }

    fn set_visible(&mut self, node: Entity, visible: bool) {
        if let Some(mut visibility) = self.world.get_mut::<Visibility>(node) {
            visibility.0 = visible;
        }
    }

    fn render(&mut self, backend: &mut B, camera: &VirtualCamera) -> BackendResult<()> {
        (self.draw)(&mut *self.world, backend, camera)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use glam::Vec3;

    fn no_draw(_: &mut World, _: &mut DummyBackend, _: &VirtualCamera) -> BackendResult<()> {
        Ok(())
    }

    #[test]
    fn test_world_scene_reads_transform_and_toggles_visibility() {
        let mut world = World::new();
        let floor = world
            .spawn((Transform::from_position(Vec3::new(0.0, -1.0, 0.0)), Visibility::default()))
            .id();

        let mut scene = WorldScene::new(&mut world, no_draw);
        let matrix = SceneHost::<DummyBackend>::world_matrix(&scene, floor).unwrap();
        assert_eq!(matrix.w_axis.truncate(), Vec3::new(0.0, -1.0, 0.0));

        SceneHost::<DummyBackend>::set_visible(&mut scene, floor, false);
        assert!(!scene.world().get::<Visibility>(floor).unwrap().is_visible());
    }

    #[test]
    fn test_world_scene_missing_entity() {
        let mut world = World::new();
        let gone = world.spawn(Transform::default()).id();
        world.despawn(gone);

        let scene = WorldScene::new(&mut world, no_draw);
        assert!(SceneHost::<DummyBackend>::world_matrix(&scene, gone).is_none());
    }
}
