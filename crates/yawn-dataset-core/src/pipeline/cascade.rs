//! Ordered fallback over face detectors.

use image::DynamicImage;
use tracing::{debug, warn};

use crate::domain::{DetectorKind, FaceRegion};
use crate::ports::FaceDetector;

/// Tries each detector in order until one finds a face.
pub struct FaceCascade {
    detectors: Vec<Box<dyn FaceDetector>>,
}

impl FaceCascade {
    /// Creates a cascade from detectors in priority order.
    #[must_use]
    pub fn new(detectors: Vec<Box<dyn FaceDetector>>) -> Self {
        Self { detectors }
    }

    /// Kinds of the configured detectors, in priority order.
    #[must_use]
    pub fn kinds(&self) -> Vec<DetectorKind> {
        self.detectors.iter().map(|d| d.kind()).collect()
    }

    /// Returns the first non-empty detection and the detector that made it.
    ///
    /// Detector errors are logged and treated as "no face".
    pub fn detect(&mut self, frame: &DynamicImage) -> (Vec<FaceRegion>, Option<DetectorKind>) {
        for detector in &mut self.detectors {
            let kind = detector.kind();
            let faces = run_detector(detector.as_mut(), frame);
            if !faces.is_empty() {
                debug!(detector = %kind, faces = faces.len(), "Face found");
                return (faces, Some(kind));
            }
        }
        (Vec::new(), None)
    }

    /// Runs only the detector of the given kind.
    ///
    /// Returns no regions if that kind is not configured.
    pub fn detect_with(&mut self, kind: DetectorKind, frame: &DynamicImage) -> Vec<FaceRegion> {
        self.detectors
            .iter_mut()
            .find(|d| d.kind() == kind)
            .map(|d| run_detector(d.as_mut(), frame))
            .unwrap_or_default()
    }
}

fn run_detector(detector: &mut dyn FaceDetector, frame: &DynamicImage) -> Vec<FaceRegion> {
    match detector.detect(frame) {
        Ok(faces) => faces,
        Err(e) => {
            warn!(detector = %detector.kind(), "Face detection failed: {e:#}");
            Vec::new()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct Fixed {
        kind: DetectorKind,
        faces: Vec<FaceRegion>,
        fail: bool,
    }

    impl Fixed {
        fn boxed(kind: DetectorKind, faces: Vec<FaceRegion>) -> Box<dyn FaceDetector> {
            Box::new(Self {
                kind,
                faces,
                fail: false,
            })
        }
    }

    impl FaceDetector for Fixed {
        fn kind(&self) -> DetectorKind {
            self.kind
        }

        fn detect(&mut self, _image: &DynamicImage) -> anyhow::Result<Vec<FaceRegion>> {
            if self.fail {
                anyhow::bail!("backend error");
            }
            Ok(self.faces.clone())
        }
    }

    fn frame() -> DynamicImage {
        DynamicImage::new_rgb8(64, 64)
    }

    #[test]
    fn test_first_non_empty_wins() {
        let face = FaceRegion::new(1, 2, 30, 40);
        let mut cascade = FaceCascade::new(vec![
            Fixed::boxed(DetectorKind::Primary, vec![]),
            Fixed::boxed(DetectorKind::Ssd, vec![face]),
            Fixed::boxed(DetectorKind::BlazeFace, vec![FaceRegion::new(0, 0, 5, 5)]),
        ]);

        let (faces, kind) = cascade.detect(&frame());
        assert_eq!(faces, vec![face]);
        assert_eq!(kind, Some(DetectorKind::Ssd));
    }

    #[test]
    fn test_all_empty_returns_none() {
        let mut cascade = FaceCascade::new(vec![
            Fixed::boxed(DetectorKind::Primary, vec![]),
            Fixed::boxed(DetectorKind::Ssd, vec![]),
        ]);

        let (faces, kind) = cascade.detect(&frame());
        assert!(faces.is_empty());
        assert_eq!(kind, None);
    }

    #[test]
    fn test_failing_detector_is_skipped() {
        let face = FaceRegion::new(0, 0, 60, 60);
        let mut cascade = FaceCascade::new(vec![
            Box::new(Fixed {
                kind: DetectorKind::Primary,
                faces: vec![face],
                fail: true,
            }),
            Fixed::boxed(DetectorKind::BlazeFace, vec![face]),
        ]);

        let (faces, kind) = cascade.detect(&frame());
        assert_eq!(faces.len(), 1);
        assert_eq!(kind, Some(DetectorKind::BlazeFace));
    }

    #[test]
    fn test_detect_with_specific_kind() {
        let ssd_face = FaceRegion::new(5, 5, 55, 55);
        let mut cascade = FaceCascade::new(vec![
            Fixed::boxed(DetectorKind::Primary, vec![FaceRegion::new(0, 0, 60, 60)]),
            Fixed::boxed(DetectorKind::Ssd, vec![ssd_face]),
        ]);

        assert_eq!(
            cascade.detect_with(DetectorKind::Ssd, &frame()),
            vec![ssd_face]
        );
        assert!(cascade
            .detect_with(DetectorKind::BlazeFace, &frame())
            .is_empty());
        assert_eq!(
            cascade.kinds(),
            vec![DetectorKind::Primary, DetectorKind::Ssd]
        );
    }
}
