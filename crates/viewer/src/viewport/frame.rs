//! Per-frame draw plan.
//!
//! The plan is a plain value built between frames: opaque draws, then
//! transparent draws, then one stencil triple per capped (axis, solid) pair
//! each followed by a stencil clear, then present. The GL renderer executes
//! it in order and never looks at the scene graph.

use glam::{Affine3A, Vec4};
use shared::NodePath;

use super::clipping::ClippingSystem;
use super::material::Material;
use super::mesh::Geometry;
use super::render_unit::{Role, SubMesh};
use crate::build::SceneGraph;
use crate::error::{Result, ViewerError};

/// What a draw item renders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawRole {
    Mesh(Role),
    BackStencil,
    FrontStencil,
    Cap,
}

#[derive(Debug, Clone)]
pub struct DrawItem {
    pub path: NodePath,
    pub role: DrawRole,
    pub geometry: Geometry,
    pub material: Material,
    pub transform: Affine3A,
    /// Resolved plane equations `(normal, constant)` the draw is clipped by
    pub clip_planes: Vec<Vec4>,
}

#[derive(Debug, Clone)]
pub enum Pass {
    Opaque(Vec<DrawItem>),
    Transparent(Vec<DrawItem>),
    /// Back stencil, front stencil, cap for one (axis, solid) pair
    Stencil {
        axis: usize,
        path: NodePath,
        items: Vec<DrawItem>,
    },
    ClearStencil,
    Present,
}

#[derive(Debug, Clone, Default)]
pub struct FramePlan {
    pub passes: Vec<Pass>,
}

impl FramePlan {
    pub fn draw_count(&self) -> usize {
        self.passes
            .iter()
            .map(|p| match p {
                Pass::Opaque(items) | Pass::Transparent(items) => items.len(),
                Pass::Stencil { items, .. } => items.len(),
                Pass::ClearStencil | Pass::Present => 0,
            })
            .sum()
    }

    /// (axis, path) of every stencil pass, in draw order
    pub fn stencil_pairs(&self) -> Vec<(usize, &str)> {
        self.passes
            .iter()
            .filter_map(|p| match p {
                Pass::Stencil { axis, path, .. } => Some((*axis, path.as_str())),
                _ => None,
            })
            .collect()
    }
}

fn resolve_planes(material: &Material, clipping: &ClippingSystem) -> Result<Vec<Vec4>> {
    let indices = material.clipping.planes();
    if indices.is_empty() {
        return Ok(Vec::new());
    }
    let planes = clipping.planes().ok_or(ViewerError::StencilOrdering)?;
    Ok(indices
        .iter()
        .filter_map(|&i| planes.get(i))
        .map(|p| p.as_vec4())
        .collect())
}

fn item(
    path: &str,
    role: DrawRole,
    mesh: &SubMesh,
    transform: Affine3A,
    clipping: &ClippingSystem,
) -> Result<DrawItem> {
    Ok(DrawItem {
        path: path.to_string(),
        role,
        geometry: mesh.geometry.clone(),
        material: mesh.material.clone(),
        transform,
        clip_planes: resolve_planes(&mesh.material, clipping)?,
    })
}

/// Build the draw plan for the current graph and clip state.
pub fn plan_frame(graph: &SceneGraph, clipping: &ClippingSystem) -> Result<FramePlan> {
    let mut opaque = Vec::new();
    let mut transparent = Vec::new();

    for unit in graph.units() {
        for (role, mesh) in unit.submeshes() {
            if !mesh.visible {
                continue;
            }
            let draw = item(unit.path(), DrawRole::Mesh(role), mesh, unit.transform, clipping)?;
            if mesh.material.transparent {
                transparent.push(draw);
            } else {
                opaque.push(draw);
            }
        }
    }

    let mut passes = vec![Pass::Opaque(opaque), Pass::Transparent(transparent)];

    if clipping.has_planes() {
        for axis in 0..3 {
            let Some(cap_transform) = clipping.cap_transform(axis) else { continue };
            for unit in graph.units() {
                let (Some(meshes), Some(front)) = (unit.clip_meshes(axis), unit.submesh(Role::Front)) else {
                    continue;
                };
                // caps follow the solid: hidden or unclipped solids get none
                if !front.visible || !front.material.clipping.planes().contains(&axis) {
                    continue;
                }
                let items = vec![
                    item(unit.path(), DrawRole::BackStencil, &meshes.back_stencil, unit.transform, clipping)?,
                    item(unit.path(), DrawRole::FrontStencil, &meshes.front_stencil, unit.transform, clipping)?,
                    item(unit.path(), DrawRole::Cap, &meshes.cap, cap_transform, clipping)?,
                ];
                passes.push(Pass::Stencil {
                    axis,
                    path: unit.path().to_string(),
                    items,
                });
                passes.push(Pass::ClearStencil);
            }
        }
    }

    passes.push(Pass::Present);
    Ok(FramePlan { passes })
}
