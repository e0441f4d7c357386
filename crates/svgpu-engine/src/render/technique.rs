//! Technique table: 2×4×3 fragment entry points of one shader module.

use std::borrow::Cow;

use crate::backend::{AaMode, CompositeKind, ShapeKind, Technique};
use crate::error::LoadError;

use super::config::ShaderSource;

const BUILTIN: &str = include_str!("shaders/vg.wgsl");

pub(crate) const VERTEX_ENTRY: &str = "vs_main";

/// Fragment entry point name of `t`, e.g. `fs_edge_aa_tris_alpha`.
pub fn entry_point(t: Technique) -> String {
    let aa = match t.aa {
        AaMode::EdgeAa => "edge_aa",
        AaMode::NoAa => "no_aa",
    };
    let shape = match t.shape {
        ShapeKind::Gradient => "gradient",
        ShapeKind::Image => "image",
        ShapeKind::StencilFill => "stencil_fill",
        ShapeKind::Triangles => "tris",
    };
    let composite = match t.composite {
        CompositeKind::Premultiplied => "premultiplied",
        CompositeKind::NonPremultiplied => "nonpremultiplied",
        CompositeKind::Alpha => "alpha",
    };
    format!("fs_{aa}_{shape}_{composite}")
}

/// Reads the bundle source and checks that every technique is present.
pub(crate) fn load_source(source: &ShaderSource) -> Result<Cow<'static, str>, LoadError> {
    let text: Cow<'static, str> = match source {
        ShaderSource::Builtin => Cow::Borrowed(BUILTIN),
        ShaderSource::File(path) => {
            let text = std::fs::read_to_string(path).map_err(|source| LoadError::ShaderBundle {
                path: path.clone(),
                source,
            })?;
            Cow::Owned(text)
        }
    };
    validate(&text)?;
    Ok(text)
}

fn validate(text: &str) -> Result<(), LoadError> {
    if !declares_fn(text, VERTEX_ENTRY) {
        return Err(LoadError::MissingTechnique {
            technique: "vertex".to_owned(),
            entry_point: VERTEX_ENTRY.to_owned(),
        });
    }
    for t in Technique::all() {
        let name = entry_point(t);
        if !declares_fn(text, &name) {
            return Err(LoadError::MissingTechnique {
                technique: t.name(),
                entry_point: name,
            });
        }
    }
    Ok(())
}

fn declares_fn(text: &str, name: &str) -> bool {
    text.match_indices("fn ").any(|(i, _)| {
        let rest = text[i + 3..].trim_start();
        rest.strip_prefix(name)
            .is_some_and(|tail| tail.trim_start().starts_with('('))
    })
}

/// Immutable lookup from technique to entry point, built once per context.
#[derive(Debug)]
pub(crate) struct TechniqueTable {
    module: wgpu::ShaderModule,
    entries: Vec<String>,
}

impl TechniqueTable {
    /// Compiles a bundle previously checked by [`load_source`].
    pub fn new(device: &wgpu::Device, text: Cow<'static, str>) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("svgpu technique bundle"),
            source: wgpu::ShaderSource::Wgsl(text),
        });
        let entries = Technique::all().map(entry_point).collect();
        log::debug!("technique bundle compiled ({} variants)", Technique::COUNT);
        Self { module, entries }
    }

    pub fn module(&self) -> &wgpu::ShaderModule {
        &self.module
    }

    pub fn fragment_entry(&self, t: Technique) -> &str {
        &self.entries[t.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_bundle_declares_every_technique() {
        assert!(validate(BUILTIN).is_ok());
    }

    #[test]
    fn entry_points_are_distinct() {
        let mut names: Vec<String> = Technique::all().map(entry_point).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Technique::COUNT);
    }

    #[test]
    fn missing_variant_is_reported() {
        let t = Technique::new(AaMode::NoAa, ShapeKind::Image, CompositeKind::Alpha);
        let cut = BUILTIN.replace(&entry_point(t), "fs_removed");
        match validate(&cut) {
            Err(LoadError::MissingTechnique { entry_point: e, .. }) => {
                assert_eq!(e, "fs_no_aa_image_alpha")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn prefix_names_do_not_match() {
        assert!(!declares_fn("fn fs_no_aa_image_alpha_x() {}", "fs_no_aa_image_alpha"));
        assert!(declares_fn("fn  fs_a (x: f32) {}", "fs_a"));
    }

    #[test]
    fn missing_bundle_file_is_a_load_error() {
        let src = ShaderSource::File("/nonexistent/bundle.wgsl".into());
        assert!(matches!(load_source(&src), Err(LoadError::ShaderBundle { .. })));
    }
}
