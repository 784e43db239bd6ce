use anyhow::{Result, anyhow};
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::vit;
use hf_hub::{Repo, RepoType, api::sync::Api};
use std::path::Path;
use std::sync::Mutex;

use super::{Classification, ImageClassifier, canonical_label};
use crate::error::ClassifierError;

const IMAGE_SIZE: usize = 224;
// ViT image processor defaults
const PIXEL_MEAN: f32 = 0.5;
const PIXEL_STD: f32 = 0.5;

/// Pretrained ViT real-vs-fake classifier loaded from the Hugging Face hub.
/// Labels come from the model's `id2label` and are mapped onto the
/// canonical human / artificial set.
pub struct VitClassifier {
    model: Mutex<vit::Model>,
    device: Device,
    labels: Vec<String>,
    model_id: String,
}

impl VitClassifier {
    pub fn new(model_repo: &str) -> Result<Self> {
        #[cfg(feature = "metal")]
        let device = Device::new_metal(0).unwrap_or(Device::Cpu);
        #[cfg(not(feature = "metal"))]
        let device = Device::Cpu;

        tracing::info!(repo = model_repo, device = ?device, "Loading classifier model");

        let api = Api::new()?;
        let repo = api.repo(Repo::new(model_repo.to_string(), RepoType::Model));

        let model_path = repo.get("model.safetensors")?;
        let config_path = repo.get("config.json")?;

        let raw_config = std::fs::read_to_string(config_path)?;
        let config: vit::Config = serde_json::from_str(&raw_config)?;
        let labels = read_labels(&serde_json::from_str(&raw_config)?)?;

        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[model_path], DType::F32, &device)? };
        let model = vit::Model::new(&config, labels.len(), vb)?;

        tracing::info!(labels = ?labels, "Classifier model loaded");

        Ok(Self {
            model: Mutex::new(model),
            device,
            labels,
            model_id: model_repo.to_string(),
        })
    }

    fn preprocess(&self, image: &Path) -> Result<Tensor, ClassifierError> {
        let img = image::open(image).map_err(|source| ClassifierError::UnreadableImage {
            path: image.to_path_buf(),
            source,
        })?;

        let rgb = img
            .resize_exact(
                IMAGE_SIZE as u32,
                IMAGE_SIZE as u32,
                image::imageops::FilterType::Triangle,
            )
            .to_rgb8()
            .into_raw();

        let plane = IMAGE_SIZE * IMAGE_SIZE;
        let mut data = vec![0f32; 3 * plane];
        for i in 0..plane {
            // CHW with normalization
            for c in 0..3 {
                let v = rgb[i * 3 + c] as f32 / 255.0;
                data[c * plane + i] = (v - PIXEL_MEAN) / PIXEL_STD;
            }
        }

        Tensor::from_vec(data, (1, 3, IMAGE_SIZE, IMAGE_SIZE), &self.device).map_err(inference)
    }
}

impl ImageClassifier for VitClassifier {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn classify(&self, image: &Path) -> Result<Classification, ClassifierError> {
        let input = self.preprocess(image)?;

        let model = self
            .model
            .lock()
            .map_err(|e| ClassifierError::Inference(format!("Lock error: {}", e)))?;
        let logits = model.forward(&input).map_err(inference)?;
        drop(model);

        let probs: Vec<f32> = candle_nn::ops::softmax(&logits, 1)
            .and_then(|p| p.flatten_all())
            .and_then(|p| p.to_vec1())
            .map_err(inference)?;

        let (best, confidence) = probs
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .ok_or_else(|| ClassifierError::Inference("model returned no classes".into()))?;

        let raw = self.labels.get(best).map(String::as_str).unwrap_or_default();
        tracing::debug!(image = %image.display(), raw, confidence, "Classified frame");

        Ok(Classification {
            label: canonical_label(raw).to_string(),
            confidence: confidence as f64,
            model: self.model_id.clone(),
        })
    }
}

fn inference(e: candle_core::Error) -> ClassifierError {
    ClassifierError::Inference(e.to_string())
}

/// `id2label` from a Hugging Face config, ordered by class index.
fn read_labels(config: &serde_json::Value) -> Result<Vec<String>> {
    let map = config["id2label"]
        .as_object()
        .ok_or_else(|| anyhow!("model config has no id2label"))?;

    let mut labels = vec![String::new(); map.len()];
    for (id, label) in map {
        let index: usize = id.parse()?;
        let slot = labels
            .get_mut(index)
            .ok_or_else(|| anyhow!("id2label index {} out of range", index))?;
        *slot = label.as_str().unwrap_or_default().to_string();
    }
    Ok(labels)
}
