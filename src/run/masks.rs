//! Resolution of exclude zones for a screenshot
//!
//! Exclude specs are either pre-computed rectangles or live elements whose
//! geometry is queried from the driver. When the screenshot targets a single
//! element every zone is re-based onto that element's top-left corner, the
//! coordinate space of the cropped image. Zones falling partly outside the
//! element keep their negative offsets; clipping happens server side.

use futures::future::try_join_all;
use tracing::{debug, trace, warn};

use crate::browser::ElementRef;
use crate::client::{Mask, Rectangle};
use crate::error::{Result, VisualReviewError};

/// One region to exclude from comparison
#[derive(Debug, Clone)]
pub enum MaskSpec {
    Rect(Rectangle),
    Element(ElementRef),
}

impl From<Rectangle> for MaskSpec {
    fn from(rect: Rectangle) -> Self {
        MaskSpec::Rect(rect)
    }
}

impl From<ElementRef> for MaskSpec {
    fn from(element: ElementRef) -> Self {
        MaskSpec::Element(element)
    }
}

/// Resolves every spec to a rectangle in the coordinate space of the screenshot
pub async fn resolve_masks(specs: &[MaskSpec], relative_to: Option<&ElementRef>) -> Result<Mask> {
    if specs.is_empty() {
        trace!("No exclude zones requested");
        return Ok(Mask::default());
    }

    let zones = try_join_all(specs.iter().map(resolve_spec)).await?;
    debug!("Resolved {} exclude zones", zones.len());

    let exclude_zones = match relative_to {
        None => zones,
        Some(target) => {
            let origin = element_rectangle(target).await?;
            debug!("Re-basing exclude zones onto element at ({}, {})", origin.x, origin.y);
            zones.iter().map(|zone| zone.relative_to(&origin)).collect()
        }
    };

    Ok(Mask { exclude_zones })
}

async fn resolve_spec(spec: &MaskSpec) -> Result<Rectangle> {
    match spec {
        MaskSpec::Rect(rect) => {
            validate_zone(rect)?;
            Ok(*rect)
        }
        MaskSpec::Element(element) => {
            let rect = element_rectangle(element).await?;
            validate_zone(&rect)?;
            Ok(rect)
        }
    }
}

/// Queries size and location of an element; both must succeed
pub async fn element_rectangle(element: &ElementRef) -> Result<Rectangle> {
    let (size, location) = futures::try_join!(
        async {
            element
                .size()
                .await
                .map_err(|e| VisualReviewError::Geometry(format!("could not get the mask size for the element: {:#}", e)))
        },
        async {
            element.location().await.map_err(|e| {
                VisualReviewError::Geometry(format!("could not get the mask location for the element: {:#}", e))
            })
        },
    )?;

    Ok(Rectangle {
        x: location.x.round() as i64,
        y: location.y.round() as i64,
        width: size.width.round() as i64,
        height: size.height.round() as i64,
    })
}

/// Checks an exclude zone before re-basing: origin and size must not be negative
pub fn validate_zone(rect: &Rectangle) -> Result<()> {
    if rect.x < 0 || rect.y < 0 {
        return Err(VisualReviewError::Geometry(format!(
            "exclude zone has a negative origin: ({}, {})",
            rect.x, rect.y
        )));
    }
    if rect.width < 0 || rect.height < 0 {
        return Err(VisualReviewError::Geometry(format!(
            "exclude zone has a negative size: {}x{} at ({}, {})",
            rect.width, rect.height, rect.x, rect.y
        )));
    }
    if rect.is_empty() {
        warn!(
            "Exclude zone at ({}, {}) is empty ({}x{}) and masks nothing",
            rect.x, rect.y, rect.width, rect.height
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{Element, Location, Size};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeElement {
        rect: Rectangle,
        fail_location: bool,
        queries: AtomicUsize,
    }

    fn element(x: i64, y: i64, width: i64, height: i64) -> Arc<FakeElement> {
        Arc::new(FakeElement {
            rect: Rectangle::new(x, y, width, height),
            fail_location: false,
            queries: AtomicUsize::new(0),
        })
    }

    #[async_trait]
    impl Element for FakeElement {
        async fn take_screenshot(&self) -> anyhow::Result<Vec<u8>> {
            Ok(Vec::new())
        }

        async fn size(&self) -> anyhow::Result<Size> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Ok(Size {
                width: self.rect.width as f64,
                height: self.rect.height as f64,
            })
        }

        async fn location(&self) -> anyhow::Result<Location> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            if self.fail_location {
                return Err(anyhow!("stale element reference"));
            }
            Ok(Location {
                x: self.rect.x as f64,
                y: self.rect.y as f64,
            })
        }
    }

    #[tokio::test]
    async fn test_empty_specs_yield_empty_mask_without_querying_target() {
        let target = element(10, 10, 100, 100);
        let target_ref: ElementRef = target.clone();
        let mask = resolve_masks(&[], Some(&target_ref)).await.unwrap();
        assert!(mask.is_empty());
        assert_eq!(target.queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_viewport_masks_are_returned_unchanged() {
        let specs = vec![
            MaskSpec::Rect(Rectangle::new(0, 0, 50, 20)),
            MaskSpec::Element(element(200, 300, 40, 10)),
        ];
        let mask = resolve_masks(&specs, None).await.unwrap();
        assert_eq!(
            mask.exclude_zones,
            vec![Rectangle::new(0, 0, 50, 20), Rectangle::new(200, 300, 40, 10)]
        );
    }

    #[tokio::test]
    async fn test_element_screenshot_rebases_masks() {
        let target: ElementRef = element(100, 50, 400, 300);
        let specs = vec![
            MaskSpec::Rect(Rectangle::new(120, 80, 30, 40)),
            MaskSpec::Element(element(90, 60, 20, 20)),
        ];
        let mask = resolve_masks(&specs, Some(&target)).await.unwrap();
        assert_eq!(
            mask.exclude_zones,
            vec![Rectangle::new(20, 30, 30, 40), Rectangle::new(-10, 10, 20, 20)]
        );
    }

    #[tokio::test]
    async fn test_failed_location_query_is_geometry_error() {
        let broken = Arc::new(FakeElement {
            rect: Rectangle::new(0, 0, 10, 10),
            fail_location: true,
            queries: AtomicUsize::new(0),
        });
        let specs = vec![MaskSpec::Element(broken)];
        let err = resolve_masks(&specs, None).await.unwrap_err();
        assert!(matches!(err, VisualReviewError::Geometry(ref msg) if msg.contains("stale element")));
    }

    #[tokio::test]
    async fn test_negative_size_is_rejected_and_zero_size_is_kept() {
        let negative = vec![MaskSpec::Rect(Rectangle::new(0, 0, -5, 10))];
        assert!(matches!(
            resolve_masks(&negative, None).await,
            Err(VisualReviewError::Geometry(_))
        ));

        let empty = vec![MaskSpec::Rect(Rectangle::new(5, 5, 0, 10))];
        let mask = resolve_masks(&empty, None).await.unwrap();
        assert_eq!(mask.exclude_zones, vec![Rectangle::new(5, 5, 0, 10)]);
    }

    #[tokio::test]
    async fn test_negative_origin_is_rejected_before_rebasing() {
        for rect in [Rectangle::new(-1, 0, 10, 10), Rectangle::new(0, -3, 10, 10)] {
            let specs = vec![MaskSpec::Rect(rect)];
            assert!(matches!(
                resolve_masks(&specs, None).await,
                Err(VisualReviewError::Geometry(ref msg)) if msg.contains("negative origin")
            ));
        }

        let target: ElementRef = element(100, 100, 50, 50);
        let specs = vec![MaskSpec::Rect(Rectangle::new(10, 10, 5, 5))];
        let mask = resolve_masks(&specs, Some(&target)).await.unwrap();
        assert_eq!(mask.exclude_zones, vec![Rectangle::new(-90, -90, 5, 5)]);
    }

    #[tokio::test]
    async fn test_rectangle_at_origin_is_not_treated_as_element() {
        let specs = vec![MaskSpec::from(Rectangle::new(0, 0, 10, 10))];
        let mask = resolve_masks(&specs, None).await.unwrap();
        assert_eq!(mask.exclude_zones, vec![Rectangle::new(0, 0, 10, 10)]);
    }
}
