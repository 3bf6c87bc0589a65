//! Model registry: resolves user-supplied model strings to backend specs.
//!
//! Pure lookup component. The registry is populated once at startup from a
//! built-in table and never mutated afterwards, so every [`ModelSpec`] it
//! hands out is freely shareable across the admission layer, the scheduler,
//! and the HTTP surface.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The literal that OpenAI clients send by default; treated as passthrough.
pub const OPENAI_DEFAULT_MODEL: &str = "whisper-1";

/// Closed set of supported inference engine families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EngineType {
    Funasr,
    Mlx,
}

/// Immutable declaration of what a loaded model can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineCapabilities {
    pub timestamp: bool,
    pub diarization: bool,
    pub emotion_tags: bool,
    pub language_detect: bool,
}

impl EngineCapabilities {
    pub const fn none() -> Self {
        Self {
            timestamp: false,
            diarization: false,
            emotion_tags: false,
            language_detect: false,
        }
    }

    pub const fn all() -> Self {
        Self {
            timestamp: true,
            diarization: true,
            emotion_tags: true,
            language_detect: true,
        }
    }
}

/// Immutable description of a backend model: a user-facing alias bound to a
/// concrete `(engine_type, model_id)` pair plus its declared capabilities.
///
/// Two specs are equal iff all fields are equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub alias: String,
    pub model_id: String,
    pub engine_type: EngineType,
    pub description: String,
    pub capabilities: EngineCapabilities,
}

/// Error produced when a model string cannot be resolved to a spec.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown model '{model}'; see GET /v1/models for the supported list")]
pub struct UnknownModelError {
    pub model: String,
}

/// Process-wide, read-only table of named [`ModelSpec`]s, plus a reverse
/// index from `model_id` to `alias`.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    by_alias: HashMap<String, ModelSpec>,
    model_id_to_alias: HashMap<String, String>,
}

impl ModelRegistry {
    /// Build a registry from an explicit set of specs (used by tests and by
    /// [`ModelRegistry::with_builtins`]).
    pub fn new(specs: Vec<ModelSpec>) -> Self {
        let mut by_alias = HashMap::with_capacity(specs.len());
        let mut model_id_to_alias = HashMap::with_capacity(specs.len());
        for spec in specs {
            model_id_to_alias.insert(spec.model_id.clone(), spec.alias.clone());
            by_alias.insert(spec.alias.clone(), spec);
        }
        Self {
            by_alias,
            model_id_to_alias,
        }
    }

    /// The five models the original implementation shipped with, spanning
    /// both engine types and a spread of capability combinations.
    pub fn with_builtins() -> Self {
        Self::new(vec![
            ModelSpec {
                alias: "paraformer".into(),
                model_id: "iic/speech_seaco_paraformer_large_asr_nat-zh-cn-16k-common-vocab8404-pytorch".into(),
                engine_type: EngineType::Funasr,
                description: "Paraformer large (Mandarin), FunASR".into(),
                capabilities: EngineCapabilities {
                    timestamp: true,
                    diarization: true,
                    emotion_tags: false,
                    language_detect: true,
                },
            },
            ModelSpec {
                alias: "sensevoice-small".into(),
                model_id: "iic/SenseVoiceSmall".into(),
                engine_type: EngineType::Funasr,
                description: "SenseVoice small, multilingual with emotion tags".into(),
                capabilities: EngineCapabilities {
                    timestamp: false,
                    diarization: false,
                    emotion_tags: true,
                    language_detect: true,
                },
            },
            ModelSpec {
                alias: "qwen3-asr-mini".into(),
                model_id: "mlx-community/Qwen3-ASR-1.7B-4bit".into(),
                engine_type: EngineType::Mlx,
                description: "Qwen3 ASR mini, 4-bit MLX quantisation".into(),
                capabilities: EngineCapabilities {
                    timestamp: true,
                    diarization: false,
                    emotion_tags: false,
                    language_detect: true,
                },
            },
            ModelSpec {
                alias: "qwen3-asr".into(),
                model_id: "mlx-community/Qwen3-ASR-1.7B-8bit".into(),
                engine_type: EngineType::Mlx,
                description: "Qwen3 ASR, 8-bit MLX quantisation".into(),
                capabilities: EngineCapabilities {
                    timestamp: true,
                    diarization: false,
                    emotion_tags: false,
                    language_detect: true,
                },
            },
            ModelSpec {
                alias: "parakeet".into(),
                model_id: "mlx-community/parakeet-tdt-0.6b-v2".into(),
                engine_type: EngineType::Mlx,
                description: "NVIDIA Parakeet TDT, MLX port".into(),
                capabilities: EngineCapabilities {
                    timestamp: true,
                    diarization: false,
                    emotion_tags: false,
                    language_detect: false,
                },
            },
        ])
    }

    /// Resolve a user-supplied model string to a [`ModelSpec`].
    ///
    /// Resolution order: exact alias match, exact `model_id` match, then
    /// prefix-based inference for unregistered paths so that local variants
    /// can be benchmarked without hard-coding them.
    pub fn lookup(&self, model: &str) -> Result<ModelSpec, UnknownModelError> {
        if let Some(spec) = self.by_alias.get(model) {
            return Ok(spec.clone());
        }
        if let Some(alias) = self.model_id_to_alias.get(model) {
            return Ok(self.by_alias[alias].clone());
        }
        if let Some(spec) = Self::infer_from_prefix(model) {
            return Ok(spec);
        }
        Err(UnknownModelError {
            model: model.to_owned(),
        })
    }

    fn infer_from_prefix(model: &str) -> Option<ModelSpec> {
        let engine_type = if model.starts_with("mlx-community/") {
            EngineType::Mlx
        } else if model.starts_with("iic/") || model.to_ascii_lowercase().contains("funasr") {
            EngineType::Funasr
        } else {
            return None;
        };
        Some(ModelSpec {
            alias: model.to_owned(),
            model_id: model.to_owned(),
            engine_type,
            description: "resolved at load time".into(),
            capabilities: EngineCapabilities::none(),
        })
    }

    /// True iff `model` means "use whatever is currently loaded": absent, the
    /// empty string, or the OpenAI placeholder `whisper-1`. Passthrough
    /// requests never trigger a swap.
    pub fn is_passthrough(model: Option<&str>) -> bool {
        match model {
            None => true,
            Some(s) => s.is_empty() || s == OPENAI_DEFAULT_MODEL,
        }
    }

    /// All registered specs, ordered by alias.
    pub fn list_all(&self) -> Vec<ModelSpec> {
        let mut specs: Vec<ModelSpec> = self.by_alias.values().cloned().collect();
        specs.sort_by(|a, b| a.alias.cmp(&b.alias));
        specs
    }

    /// The alias bound to a given `model_id`, if any.
    pub fn alias_for(&self, model_id: &str) -> Option<String> {
        self.model_id_to_alias.get(model_id).cloned()
    }

    /// Build a spec for an unregistered startup `model_id`, trusting the
    /// explicitly configured `engine_type` rather than guessing it from the
    /// path, since the caller (startup config) knows it authoritatively.
    pub fn spec_for_startup(engine_type: EngineType, model_id: &str) -> ModelSpec {
        ModelSpec {
            alias: model_id.to_owned(),
            model_id: model_id.to_owned(),
            engine_type,
            description: "resolved at startup".into(),
            capabilities: EngineCapabilities::none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_alias_is_idempotent() {
        let reg = ModelRegistry::with_builtins();
        for spec in reg.list_all() {
            let looked_up = reg.lookup(&spec.alias).unwrap();
            assert_eq!(looked_up.alias, spec.alias);
        }
    }

    #[test]
    fn lookup_by_model_id_matches_lookup_by_alias() {
        let reg = ModelRegistry::with_builtins();
        for spec in reg.list_all() {
            let by_id = reg.lookup(&spec.model_id).unwrap();
            let by_alias = reg.lookup(&spec.alias).unwrap();
            assert_eq!(by_id, by_alias);
        }
    }

    #[test]
    fn list_all_is_alias_sorted() {
        let reg = ModelRegistry::with_builtins();
        let aliases: Vec<String> = reg.list_all().into_iter().map(|s| s.alias).collect();
        let mut sorted = aliases.clone();
        sorted.sort();
        assert_eq!(aliases, sorted);
    }

    #[test]
    fn passthrough_values() {
        assert!(ModelRegistry::is_passthrough(None));
        assert!(ModelRegistry::is_passthrough(Some("")));
        assert!(ModelRegistry::is_passthrough(Some(OPENAI_DEFAULT_MODEL)));
        assert!(!ModelRegistry::is_passthrough(Some("paraformer")));
    }

    #[test]
    fn prefix_inference_for_unregistered_paths() {
        let reg = ModelRegistry::with_builtins();
        let mlx = reg.lookup("mlx-community/some-unlisted-variant").unwrap();
        assert_eq!(mlx.engine_type, EngineType::Mlx);
        assert_eq!(mlx.capabilities, EngineCapabilities::none());

        let funasr = reg.lookup("iic/some-unlisted-variant").unwrap();
        assert_eq!(funasr.engine_type, EngineType::Funasr);

        let funasr_by_name = reg.lookup("my-custom-FunASR-model").unwrap();
        assert_eq!(funasr_by_name.engine_type, EngineType::Funasr);
    }

    #[test]
    fn unknown_model_fails() {
        let reg = ModelRegistry::with_builtins();
        let err = reg.lookup("totally-unknown").unwrap_err();
        assert!(err.to_string().contains("totally-unknown"));
    }

    #[test]
    fn alias_for_model_id() {
        let reg = ModelRegistry::with_builtins();
        assert_eq!(
            reg.alias_for("iic/speech_seaco_paraformer_large_asr_nat-zh-cn-16k-common-vocab8404-pytorch"),
            Some("paraformer".to_string())
        );
        assert_eq!(reg.alias_for("does-not-exist"), None);
    }
}
