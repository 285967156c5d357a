//! Category classification from path keywords and file size.
//!
//! Rules are evaluated in table order and the first keyword hit wins, so the
//! order of [`KEYWORD_RULES`] is the tie-break policy. Size is consulted only
//! when no keyword matches.

use crate::config::SizeThresholds;
use crate::organizer::types::{Candidate, Category};
use serde::Serialize;
use std::path::Path;

/// One keyword group mapping to a category.
#[derive(Debug)]
pub struct KeywordRule {
    pub category: Category,
    pub keywords: &'static [&'static str],
}

/// Keyword groups in priority order.
pub const KEYWORD_RULES: &[KeywordRule] = &[
    KeywordRule {
        category: Category::Lora,
        keywords: &["lora", "lycoris", "adapter"],
    },
    KeywordRule {
        category: Category::Embedding,
        keywords: &["embedding", "textual_inversion", "ti_"],
    },
    KeywordRule {
        category: Category::Controlnet,
        keywords: &["controlnet", "control_"],
    },
    KeywordRule {
        category: Category::Upscaler,
        keywords: &["upscaler", "esrgan", "realesrgan"],
    },
    KeywordRule {
        category: Category::Vae,
        keywords: &["vae"],
    },
    KeywordRule {
        category: Category::Clip,
        keywords: &["clip", "t5", "text_encoder"],
    },
    KeywordRule {
        category: Category::Unet,
        keywords: &["flux", "unet", "dit", "transformer"],
    },
];

/// What decided a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum ClassificationReason {
    Keyword(&'static str),
    SizeFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub category: Category,
    pub reason: ClassificationReason,
}

/// Classify a candidate by its path relative to the scanned root.
pub fn classify(candidate: &Candidate, thresholds: &SizeThresholds) -> Category {
    classify_path(&candidate.relative_path, candidate.size_bytes, thresholds).category
}

/// Classify any path/size pair, recording which rule decided.
pub fn classify_path(path: &Path, size_bytes: u64, thresholds: &SizeThresholds) -> Classification {
    let haystack = path.to_string_lossy().to_lowercase();

    for rule in KEYWORD_RULES {
        if let Some(keyword) = rule.keywords.iter().find(|k| haystack.contains(*k)) {
            return Classification {
                category: rule.category,
                reason: ClassificationReason::Keyword(keyword),
            };
        }
    }

    Classification {
        category: classify_by_size(size_bytes, thresholds),
        reason: ClassificationReason::SizeFallback,
    }
}

/// Size heuristic for unlabeled files. Small files are almost always
/// embeddings or adapters; large anonymous ones are base checkpoints.
pub fn classify_by_size(size_bytes: u64, thresholds: &SizeThresholds) -> Category {
    if size_bytes < thresholds.embedding_max_bytes {
        Category::Embedding
    } else if size_bytes < thresholds.lora_max_bytes {
        Category::Lora
    } else {
        Category::Checkpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * MB;

    fn category_of(path: &str, size: u64) -> Category {
        classify_path(Path::new(path), size, &SizeThresholds::default()).category
    }

    #[test]
    fn test_keyword_beats_size() {
        assert_eq!(category_of("flux_lora_v2.safetensors", 900 * MB), Category::Lora);
        assert_eq!(
            classify_path(Path::new("flux_lora_v2.safetensors"), 900 * MB, &SizeThresholds::default())
                .reason,
            ClassificationReason::Keyword("lora")
        );
    }

    #[test]
    fn test_size_fallback() {
        assert_eq!(category_of("model_xyz123.safetensors", 30 * MB), Category::Embedding);
        assert_eq!(category_of("model_xyz123.safetensors", 200 * MB), Category::Lora);
        assert_eq!(category_of("model_xyz123.safetensors", 2 * GB), Category::Checkpoint);
    }

    #[test]
    fn test_size_boundaries() {
        let t = SizeThresholds::default();
        assert_eq!(classify_by_size(50 * MB - 1, &t), Category::Embedding);
        assert_eq!(classify_by_size(50 * MB, &t), Category::Lora);
        assert_eq!(classify_by_size(500 * MB - 1, &t), Category::Lora);
        assert_eq!(classify_by_size(500 * MB, &t), Category::Checkpoint);
    }

    #[test]
    fn test_priority_order() {
        // vae outranks clip and unet
        assert_eq!(category_of("sdxl_vae_unet.safetensors", 1), Category::Vae);
        // controlnet outranks unet keywords
        assert_eq!(category_of("flux_controlnet_canny.safetensors", 3 * GB), Category::Controlnet);
        assert_eq!(category_of("4x_RealESRGAN.pth", 60 * MB), Category::Upscaler);
        assert_eq!(category_of("t5xxl_fp16.safetensors", 9 * GB), Category::Clip);
        assert_eq!(category_of("flux1-dev.safetensors", 23 * GB), Category::Unet);
        assert_eq!(category_of("EasyNegative_TI_v1.pt", 2 * GB), Category::Embedding);
    }

    #[test]
    fn test_directory_components_count() {
        assert_eq!(category_of("loras/anime/style.safetensors", 3 * GB), Category::Lora);
        assert_eq!(
            category_of("models--acme--bigmodel/snapshots/abcd1234/vae/diffusion_pytorch_model.safetensors", 300 * MB),
            Category::Vae
        );
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(category_of("MyStyle_LoRA.SAFETENSORS", 3 * GB), Category::Lora);
        assert_eq!(category_of("SDXL_VAE.safetensors", 3 * GB), Category::Vae);
    }

    #[test]
    fn test_cache_path_without_keyword_uses_size() {
        let path = "models--acme--bigmodel/snapshots/abcd1234/model.safetensors";
        assert_eq!(category_of(path, 2 * GB), Category::Checkpoint);
        assert_eq!(category_of(path, 10 * MB), Category::Embedding);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let candidate = Candidate::flat(
            PathBuf::from("/dl/anything.ckpt"),
            PathBuf::from("anything.ckpt"),
            123 * MB,
        );
        let t = SizeThresholds::default();
        assert_eq!(classify(&candidate, &t), classify(&candidate, &t));
    }

    #[test]
    fn test_custom_thresholds() {
        let t = SizeThresholds {
            embedding_max_bytes: MB,
            lora_max_bytes: 2 * MB,
        };
        assert_eq!(classify_path(Path::new("x.bin"), MB, &t).category, Category::Lora);
        assert_eq!(classify_path(Path::new("x.bin"), 2 * MB, &t).category, Category::Checkpoint);
    }
}
