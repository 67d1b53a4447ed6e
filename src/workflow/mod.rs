//! Captioning workflow sequencing.
//!
//! Each operation takes the current `CaptionSet` (if any), talks to the
//! captioning service at most once, and produces the replacement set.
//! Guards run before any network traffic; a failed call leaves the
//! caller's existing set untouched because a new set is only produced on
//! success.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::api::validation::validate_image_url;
use crate::captioner::{CaptionService, CaptionerError};

/// The current image plus its candidate captions and optional selection.
///
/// Invariant: `selected`, when present, indexes into `captions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptionSet {
    pub image_path: String,
    pub captions: Vec<String>,
    pub selected: Option<usize>,
    pub language: String,
}

impl CaptionSet {
    fn fresh(image_path: String, captions: Vec<String>) -> Self {
        Self {
            image_path,
            captions,
            selected: None,
            language: "en".to_string(),
        }
    }

    pub fn selected_caption(&self) -> Option<&str> {
        self.selected
            .and_then(|i| self.captions.get(i))
            .map(String::as_str)
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("No image to work on")]
    NoImage,
    #[error("No captions to translate")]
    NoCaptions,
    #[error("Select a caption first")]
    NoSelection,
    #[error("Selection index {index} is out of range for {len} captions")]
    SelectionOutOfRange { index: usize, len: usize },
    #[error(transparent)]
    Service(#[from] CaptionerError),
}

/// Sequences captioning service calls. Holds no per-user state itself;
/// callers own the `CaptionSet` and decide where the result lands.
#[derive(Clone)]
pub struct WorkflowEngine {
    service: Arc<dyn CaptionService>,
}

impl WorkflowEngine {
    pub fn new(service: Arc<dyn CaptionService>) -> Self {
        Self { service }
    }

    /// Send image bytes for captioning. The returned set replaces any
    /// previous one wholesale.
    pub async fn upload(
        &self,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<CaptionSet, WorkflowError> {
        let batch = self.service.upload(file_name, content).await?;
        Ok(CaptionSet::fresh(batch.image_path, batch.captions))
    }

    /// Caption an image by URL. Rejects syntactically malformed URLs
    /// before issuing any network call.
    pub async fn fetch_by_url(&self, url: &str) -> Result<CaptionSet, WorkflowError> {
        if validate_image_url(url).is_err() {
            return Err(WorkflowError::InvalidUrl);
        }
        let batch = self.service.fetch(url).await?;
        Ok(CaptionSet::fresh(batch.image_path, batch.captions))
    }

    /// Ask the service for a new caption list for the current image.
    /// Keeps the image path; the selection survives only if it still
    /// indexes into the new list.
    pub async fn regenerate(&self, current: &CaptionSet) -> Result<CaptionSet, WorkflowError> {
        if current.image_path.is_empty() {
            return Err(WorkflowError::NoImage);
        }
        let captions = self.service.regenerate(&current.image_path).await?;
        let selected = current.selected.filter(|&i| i < captions.len());
        Ok(CaptionSet {
            image_path: current.image_path.clone(),
            captions,
            selected,
            language: current.language.clone(),
        })
    }

    /// Replace the captions with their translations. The selection
    /// pointer is kept as-is: translation is position-preserving, so it
    /// still indexes the same (now translated) caption.
    pub async fn translate(
        &self,
        current: &CaptionSet,
        language: &str,
    ) -> Result<CaptionSet, WorkflowError> {
        if current.captions.is_empty() {
            return Err(WorkflowError::NoCaptions);
        }
        let captions = self.service.translate(&current.captions, language).await?;
        let selected = current.selected.filter(|&i| i < captions.len());
        Ok(CaptionSet {
            image_path: current.image_path.clone(),
            captions,
            selected,
            language: language.to_string(),
        })
    }

    /// Point the selection at one of the current captions.
    pub fn select(current: &CaptionSet, index: usize) -> Result<CaptionSet, WorkflowError> {
        if index >= current.captions.len() {
            return Err(WorkflowError::SelectionOutOfRange {
                index,
                len: current.captions.len(),
            });
        }
        let mut updated = current.clone();
        updated.selected = Some(index);
        Ok(updated)
    }

    /// Forward the final choice to the service. Guards run first so a
    /// confirm without a selection never reaches the network. The ack is
    /// informational; the set itself does not change.
    pub async fn confirm(&self, current: &CaptionSet) -> Result<String, WorkflowError> {
        if current.image_path.is_empty() {
            return Err(WorkflowError::NoImage);
        }
        let caption = current
            .selected_caption()
            .ok_or(WorkflowError::NoSelection)?
            .to_string();
        let ack = self.service.confirm(&caption, &current.image_path).await?;
        Ok(ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captioner::CaptionBatch;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock captioning service: counts calls, translates via a fixed
    /// dictionary, and can be flipped into a failure mode.
    #[derive(Default)]
    struct MockCaptioner {
        calls: AtomicUsize,
        fail: bool,
        confirmed: Mutex<Vec<(String, String)>>,
    }

    impl MockCaptioner {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn check_failure(&self) -> Result<(), CaptionerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(CaptionerError::Upstream("service down".to_string()))
            } else {
                Ok(())
            }
        }

        fn dictionary() -> HashMap<&'static str, &'static str> {
            HashMap::from([
                ("a cat", "kot"),
                ("a dog", "pies"),
                ("a bird", "ptak"),
            ])
        }
    }

    #[async_trait]
    impl CaptionService for MockCaptioner {
        async fn upload(
            &self,
            file_name: &str,
            _content: Vec<u8>,
        ) -> Result<CaptionBatch, CaptionerError> {
            self.check_failure()?;
            Ok(CaptionBatch {
                captions: vec!["a cat".to_string(), "a dog".to_string()],
                image_path: file_name.to_string(),
            })
        }

        async fn fetch(&self, _url: &str) -> Result<CaptionBatch, CaptionerError> {
            self.check_failure()?;
            Ok(CaptionBatch {
                captions: vec!["a bird".to_string()],
                image_path: "fetched.jpg".to_string(),
            })
        }

        async fn regenerate(&self, _image_path: &str) -> Result<Vec<String>, CaptionerError> {
            self.check_failure()?;
            Ok(vec!["a person".to_string()])
        }

        async fn translate(
            &self,
            captions: &[String],
            _language: &str,
        ) -> Result<Vec<String>, CaptionerError> {
            self.check_failure()?;
            let dict = Self::dictionary();
            Ok(captions
                .iter()
                .map(|c| dict.get(c.as_str()).map_or_else(|| c.clone(), |t| t.to_string()))
                .collect())
        }

        async fn confirm(
            &self,
            selected_caption: &str,
            image_path: &str,
        ) -> Result<String, CaptionerError> {
            self.check_failure()?;
            self.confirmed
                .lock()
                .unwrap()
                .push((selected_caption.to_string(), image_path.to_string()));
            Ok("Caption saved".to_string())
        }
    }

    fn engine_with(mock: MockCaptioner) -> (WorkflowEngine, Arc<MockCaptioner>) {
        let mock = Arc::new(mock);
        (WorkflowEngine::new(mock.clone()), mock)
    }

    #[tokio::test]
    async fn test_upload_builds_fresh_set() {
        let (engine, _) = engine_with(MockCaptioner::default());
        let set = engine.upload("x.jpg", vec![1, 2, 3]).await.unwrap();
        assert_eq!(set.image_path, "x.jpg");
        assert_eq!(set.captions, vec!["a cat".to_string(), "a dog".to_string()]);
        assert!(set.selected.is_none());
        assert_eq!(set.language, "en");
    }

    #[tokio::test]
    async fn test_fetch_invalid_url_never_hits_network() {
        let (engine, mock) = engine_with(MockCaptioner::default());
        let err = engine.fetch_by_url("not a url").await.unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidUrl));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_valid_url() {
        let (engine, mock) = engine_with(MockCaptioner::default());
        let set = engine
            .fetch_by_url("https://example.com/bird.jpg")
            .await
            .unwrap();
        assert_eq!(set.image_path, "fetched.jpg");
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_regenerate_requires_image() {
        let (engine, mock) = engine_with(MockCaptioner::default());
        let empty = CaptionSet::fresh(String::new(), vec![]);
        let err = engine.regenerate(&empty).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NoImage));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_regenerate_preserves_image_path() {
        let (engine, _) = engine_with(MockCaptioner::default());
        let set = engine.upload("x.jpg", vec![0]).await.unwrap();
        let regenerated = engine.regenerate(&set).await.unwrap();
        // Caption content is upstream-dependent; the path is ours to keep.
        assert_eq!(regenerated.image_path, "x.jpg");
    }

    #[tokio::test]
    async fn test_regenerate_drops_out_of_range_selection() {
        let (engine, _) = engine_with(MockCaptioner::default());
        let set = engine.upload("x.jpg", vec![0]).await.unwrap();
        let set = WorkflowEngine::select(&set, 1).unwrap();
        // Mock regenerate returns a single caption; index 1 no longer fits.
        let regenerated = engine.regenerate(&set).await.unwrap();
        assert!(regenerated.selected.is_none());
    }

    #[tokio::test]
    async fn test_translate_dictionary_hits_and_passthrough() {
        let (engine, _) = engine_with(MockCaptioner::default());
        let set = CaptionSet::fresh(
            "x.jpg".to_string(),
            vec![
                "a cat".to_string(),
                "a dog".to_string(),
                "a spaceship".to_string(),
            ],
        );
        let translated = engine.translate(&set, "pl").await.unwrap();
        assert_eq!(
            translated.captions,
            vec![
                "kot".to_string(),
                "pies".to_string(),
                "a spaceship".to_string()
            ]
        );
        assert_eq!(translated.language, "pl");
        assert_eq!(translated.image_path, "x.jpg");
    }

    #[tokio::test]
    async fn test_translate_keeps_selection_pointer() {
        let (engine, _) = engine_with(MockCaptioner::default());
        let set = CaptionSet::fresh(
            "x.jpg".to_string(),
            vec!["a cat".to_string(), "a dog".to_string()],
        );
        let set = WorkflowEngine::select(&set, 1).unwrap();
        let translated = engine.translate(&set, "pl").await.unwrap();
        assert_eq!(translated.selected, Some(1));
        assert_eq!(translated.selected_caption(), Some("pies"));
    }

    #[tokio::test]
    async fn test_translate_requires_captions() {
        let (engine, mock) = engine_with(MockCaptioner::default());
        let empty = CaptionSet::fresh("x.jpg".to_string(), vec![]);
        let err = engine.translate(&empty, "pl").await.unwrap_err();
        assert!(matches!(err, WorkflowError::NoCaptions));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_select_bounds_checked() {
        let set = CaptionSet::fresh("x.jpg".to_string(), vec!["a cat".to_string()]);
        assert!(WorkflowEngine::select(&set, 0).is_ok());
        let err = WorkflowEngine::select(&set, 3).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::SelectionOutOfRange { index: 3, len: 1 }
        ));
    }

    #[tokio::test]
    async fn test_confirm_without_selection_never_hits_network() {
        let (engine, mock) = engine_with(MockCaptioner::default());
        let set = CaptionSet::fresh("x.jpg".to_string(), vec!["a cat".to_string()]);
        let err = engine.confirm(&set).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NoSelection));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_confirm_forwards_selection() {
        let (engine, mock) = engine_with(MockCaptioner::default());
        let set = CaptionSet::fresh(
            "x.jpg".to_string(),
            vec!["a cat".to_string(), "a dog".to_string()],
        );
        let set = WorkflowEngine::select(&set, 0).unwrap();
        let ack = engine.confirm(&set).await.unwrap();
        assert_eq!(ack, "Caption saved");
        assert_eq!(
            mock.confirmed.lock().unwrap().as_slice(),
            &[("a cat".to_string(), "x.jpg".to_string())]
        );
    }

    #[tokio::test]
    async fn test_failed_call_produces_no_set() {
        let (engine, _) = engine_with(MockCaptioner::failing());
        let err = engine.upload("x.jpg", vec![0]).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Service(_)));
        // The caller's previous set is untouched by construction: a
        // replacement only exists on Ok.
    }
}
