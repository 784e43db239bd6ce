use serde::Serialize;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ClassifierError;

/// Label for real, human-made media.
pub const HUMAN_LABEL: &str = "human";
/// Label for AI-generated media.
pub const ARTIFICIAL_LABEL: &str = "artificial";
pub const UNKNOWN_LABEL: &str = "unknown";

/// Verdict for a single image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub label: String,
    /// Probability of `label`, in [0, 1]
    #[serde(rename = "score")]
    pub confidence: f64,
    pub model: String,
}

/// Pluggable image classifier: human-made vs AI-generated
pub trait ImageClassifier: Send + Sync {
    fn model_id(&self) -> &str;

    /// Classify one image file. May be slow; callers run it off the async runtime.
    fn classify(&self, image: &Path) -> Result<Classification, ClassifierError>;
}

/// Map a model's own vocabulary onto `human` / `artificial` / `unknown`.
pub fn canonical_label(raw: &str) -> &'static str {
    let label = raw.trim().to_ascii_lowercase();
    if label.starts_with("real") || label == HUMAN_LABEL {
        HUMAN_LABEL
    } else if label.starts_with("fake")
        || label.starts_with("ai")
        || label.starts_with("artificial")
        || label.starts_with("synthetic")
        || label.contains("generated")
    {
        ARTIFICIAL_LABEL
    } else {
        UNKNOWN_LABEL
    }
}

/// Which classifier a deployment runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierKind {
    Heuristic,
    Vit,
}

impl FromStr for ClassifierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "heuristic" | "lite" => Ok(ClassifierKind::Heuristic),
            "vit" | "model" => Ok(ClassifierKind::Vit),
            other => Err(format!("unknown classifier '{}'", other)),
        }
    }
}

/// Build the classifier once at startup; the returned handle is shared by
/// every request and released when the last clone drops.
pub fn load_classifier(
    kind: ClassifierKind,
    model_repo: &str,
) -> anyhow::Result<Arc<dyn ImageClassifier>> {
    match kind {
        ClassifierKind::Heuristic => Ok(Arc::new(HeuristicClassifier::new())),
        #[cfg(feature = "vit")]
        ClassifierKind::Vit => Ok(Arc::new(VitClassifier::new(model_repo)?)),
        #[cfg(not(feature = "vit"))]
        ClassifierKind::Vit => anyhow::bail!(
            "classifier 'vit' ({}) requires building with --features vit",
            model_repo
        ),
    }
}

mod heuristic;
#[cfg(feature = "vit")]
mod vit;

pub use heuristic::HeuristicClassifier;
#[cfg(feature = "vit")]
pub use vit::VitClassifier;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_labels() {
        assert_eq!(canonical_label("REAL"), HUMAN_LABEL);
        assert_eq!(canonical_label("realism"), HUMAN_LABEL);
        assert_eq!(canonical_label("Human"), HUMAN_LABEL);
        assert_eq!(canonical_label("FAKE"), ARTIFICIAL_LABEL);
        assert_eq!(canonical_label("AI-generated"), ARTIFICIAL_LABEL);
        assert_eq!(canonical_label("artificial"), ARTIFICIAL_LABEL);
        assert_eq!(canonical_label("drawing"), UNKNOWN_LABEL);
    }

    #[test]
    fn test_classifier_kind_parsing() {
        assert_eq!("heuristic".parse(), Ok(ClassifierKind::Heuristic));
        assert_eq!(" VIT ".parse(), Ok(ClassifierKind::Vit));
        assert!("resnet".parse::<ClassifierKind>().is_err());
    }

    #[test]
    fn test_classification_wire_shape() {
        let c = Classification {
            label: "artificial".into(),
            confidence: 0.82,
            model: "pads-lite/heuristic".into(),
        };
        assert_eq!(
            serde_json::to_value(&c).unwrap(),
            serde_json::json!({"label": "artificial", "score": 0.82, "model": "pads-lite/heuristic"})
        );
    }

    #[cfg(not(feature = "vit"))]
    #[test]
    fn test_vit_requires_feature() {
        assert!(load_classifier(ClassifierKind::Vit, "some/repo").is_err());
    }
}
