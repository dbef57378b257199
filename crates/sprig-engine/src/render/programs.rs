//! Shader program cache.
//!
//! The two built-in programs (solid fill, textured) are compiled once when the
//! cache is built and live as long as the renderer that owns it. Callers can
//! compile their own programs and pass the handle through `DrawArgs`.

use thiserror::Error;

use super::backend::{
    GraphicsBackend, ProgramDesc, ProgramHandle, ShaderStage, StageKind, VertexLayout,
};

pub const SOLID_SHADER: &str = include_str!("shaders/solid.wgsl");
pub const TEXTURED_SHADER: &str = include_str!("shaders/textured.wgsl");

/// Program build failure.
///
/// These are configuration errors: the process is not expected to continue
/// after one reaches the top level.
#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("shader compilation failed in {label} ({stage:?} stage):\n{message}")]
    Compile {
        label: String,
        stage: StageKind,
        message: String,
    },

    #[error("program link failed for {label}: {message}")]
    Link { label: String, message: String },
}

/// Checks the parts of a program description every backend needs before it
/// can link: exactly one vertex and one fragment stage, non-empty sources.
pub(crate) fn validate_program(desc: &ProgramDesc<'_>) -> Result<(), ShaderError> {
    for stage in &desc.stages {
        if stage.source.trim().is_empty() {
            return Err(ShaderError::Compile {
                label: desc.label.to_string(),
                stage: stage.kind,
                message: "empty shader source".to_string(),
            });
        }
    }

    for kind in [StageKind::Vertex, StageKind::Fragment] {
        match desc.stages.iter().filter(|s| s.kind == kind).count() {
            1 => {}
            0 => {
                return Err(ShaderError::Link {
                    label: desc.label.to_string(),
                    message: format!("missing {kind:?} stage"),
                });
            }
            n => {
                return Err(ShaderError::Link {
                    label: desc.label.to_string(),
                    message: format!("{n} {kind:?} stages attached"),
                });
            }
        }
    }

    Ok(())
}

/// Built-in programs owned by a renderer.
#[derive(Debug, Copy, Clone)]
pub struct ProgramCache {
    solid: ProgramHandle,
    textured: ProgramHandle,
}

impl ProgramCache {
    /// Compiles both built-in programs.
    pub fn new<B: GraphicsBackend>(backend: &mut B) -> Result<Self, ShaderError> {
        let solid = compile(
            backend,
            &ProgramDesc {
                label: "sprig solid program",
                layout: VertexLayout::Position,
                stages: vec![
                    ShaderStage::vertex(SOLID_SHADER, "vs_main"),
                    ShaderStage::fragment(SOLID_SHADER, "fs_main"),
                ],
            },
        )?;

        let textured = compile(
            backend,
            &ProgramDesc {
                label: "sprig textured program",
                layout: VertexLayout::PositionUv,
                stages: vec![
                    ShaderStage::vertex(TEXTURED_SHADER, "vs_main"),
                    ShaderStage::fragment(TEXTURED_SHADER, "fs_main"),
                ],
            },
        )?;

        Ok(Self { solid, textured })
    }

    #[inline]
    pub fn solid(&self) -> ProgramHandle {
        self.solid
    }

    #[inline]
    pub fn textured(&self) -> ProgramHandle {
        self.textured
    }
}

/// Compiles a program and logs failures at error level.
pub fn compile<B: GraphicsBackend>(
    backend: &mut B,
    desc: &ProgramDesc<'_>,
) -> Result<ProgramHandle, ShaderError> {
    match backend.compile_program(desc) {
        Ok(handle) => {
            log::debug!("compiled program '{}' as #{}", desc.label, handle.raw());
            Ok(handle)
        }
        Err(err) => {
            log::error!("{err}");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::HeadlessBackend;

    #[test]
    fn cache_compiles_two_distinct_programs() {
        let mut backend = HeadlessBackend::new(8, 8);
        let cache = ProgramCache::new(&mut backend).unwrap();
        assert_ne!(cache.solid(), cache.textured());
        assert_eq!(backend.program_count(), 2);
    }

    #[test]
    fn missing_fragment_stage_fails_to_link() {
        let desc = ProgramDesc {
            label: "broken",
            layout: VertexLayout::Position,
            stages: vec![ShaderStage::vertex(SOLID_SHADER, "vs_main")],
        };
        let err = validate_program(&desc).unwrap_err();
        assert!(matches!(err, ShaderError::Link { .. }));
    }

    #[test]
    fn empty_source_fails_to_compile() {
        let mut backend = HeadlessBackend::new(8, 8);
        let desc = ProgramDesc {
            label: "empty",
            layout: VertexLayout::Position,
            stages: vec![
                ShaderStage::vertex("   ", "vs_main"),
                ShaderStage::fragment(SOLID_SHADER, "fs_main"),
            ],
        };
        let err = compile(&mut backend, &desc).unwrap_err();
        assert!(matches!(
            err,
            ShaderError::Compile { stage: StageKind::Vertex, .. }
        ));
        assert_eq!(backend.program_count(), 0);
    }
}
