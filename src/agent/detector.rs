use futures::StreamExt;
use log::{debug, info, trace, warn};
use std::sync::Arc;

use crate::compose::{ImageReference, ImageSet, UpdateSet};
use crate::error::{DeployError, DetectionError};
use crate::runtime::{ContainerRuntime, PullEvent};
use crate::{PULL_STATUS_UPDATED, PULL_STATUS_UP_TO_DATE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
    Updated,
    Unchanged,
}

/// Outcome of checking one image. Failures count as `Unchanged`.
#[derive(Debug)]
pub struct ImageCheck {
    pub image: ImageReference,
    pub outcome: Result<ImageStatus, DetectionError>,
}

impl ImageCheck {
    pub fn status(&self) -> ImageStatus {
        match self.outcome {
            Ok(status) => status,
            Err(_) => ImageStatus::Unchanged,
        }
    }
}

/// Everything learned from one detection pass
#[derive(Debug, Default)]
pub struct DetectionReport {
    pub checks: Vec<ImageCheck>,
}

impl DetectionReport {
    pub fn updates(&self) -> UpdateSet {
        self.checks
            .iter()
            .filter(|check| check.status() == ImageStatus::Updated)
            .map(|check| check.image.clone())
            .collect()
    }

    pub fn failure_count(&self) -> usize {
        self.checks.iter().filter(|c| c.outcome.is_err()).count()
    }

    /// Split into per-image effective statuses and the detection errors
    pub fn into_parts(self) -> (Vec<(ImageReference, ImageStatus)>, Vec<DeployError>) {
        let mut statuses = Vec::with_capacity(self.checks.len());
        let mut errors = Vec::new();
        for check in self.checks {
            let status = check.status();
            if let Err(source) = check.outcome {
                errors.push(DeployError::Detection {
                    image: check.image.to_string(),
                    source,
                });
            }
            statuses.push((check.image, status));
        }
        (statuses, errors)
    }
}

/// Classify a pull by its terminal event
pub fn classify(last: Option<&PullEvent>) -> Result<ImageStatus, DetectionError> {
    let event = last.ok_or(DetectionError::EmptyStream)?;

    if let Some(error) = &event.error {
        return Err(DetectionError::Pull(error.clone()));
    }

    let status = event.status.as_deref().unwrap_or_default();
    if status.contains(PULL_STATUS_UPDATED) {
        Ok(ImageStatus::Updated)
    } else if status.contains(PULL_STATUS_UP_TO_DATE) {
        Ok(ImageStatus::Unchanged)
    } else {
        Err(DetectionError::UnexpectedStatus(status.to_string()))
    }
}

/// Pulls watched images and decides which ones changed upstream
#[derive(Clone)]
pub struct UpdateDetector {
    runtime: Arc<dyn ContainerRuntime>,
}

impl UpdateDetector {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Pull `image` and consume the whole event stream; the last event decides
    pub async fn check_for_update(&self, image: &str) -> Result<ImageStatus, DetectionError> {
        let mut events = self.runtime.pull_image(image);
        let mut last = None;

        while let Some(item) = events.next().await {
            match item {
                Ok(event) => {
                    trace!("pull {image}: {event:?}");
                    last = Some(event);
                }
                Err(e) => return Err(DetectionError::Stream(e)),
            }
        }

        classify(last.as_ref())
    }

    /// Check every image in turn. A failing image never stops the others.
    pub async fn detect(&self, images: &ImageSet) -> DetectionReport {
        let mut report = DetectionReport::default();

        for image in images.to_sorted_vec() {
            let outcome = self.check_for_update(image.as_str()).await;
            match &outcome {
                Ok(ImageStatus::Updated) => info!("newer image found for {image}"),
                Ok(ImageStatus::Unchanged) => debug!("{image} is up to date"),
                Err(e) => warn!("treating {image} as unchanged: {e}"),
            }
            report.checks.push(ImageCheck { image, outcome });
        }

        report
    }
}
