//! Rotating viewer state machine
//!
//! The viewer owns at most one current model. Every load it starts carries a
//! [`RequestToken`] from a monotonically increasing counter; a finished load
//! is applied only if its token is still the one the viewer is waiting for,
//! so a slow response for an old target can never replace a newer one.
//!
//! The host loop drives it: feed prop changes in with [`RotatingViewer::set_target`]
//! and [`RotatingViewer::set_visible`], run the returned [`LoadTicket`]s,
//! report results with [`RotatingViewer::complete`], and call
//! [`RotatingViewer::advance_frame`] once per rendered frame.

use glam::{EulerRot, Quat};
use std::f32::consts::TAU;
use tracing::{debug, info, warn};

use crate::config::ViewerConfig;
use crate::error::LoadError;
use crate::format::ModelFormat;
use crate::node::SceneNode;

/// Identity of one load attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// What the viewer is asked to show
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelTarget {
    pub url: String,
    pub format: ModelFormat,
}

/// A load the host must run and report back through [`RotatingViewer::complete`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub token: RequestToken,
    pub target: ModelTarget,
}

/// Spin angles about X and Y, in radians within `[0, 2π)`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Orientation {
    pub x: f32,
    pub y: f32,
}

impl Orientation {
    /// Rotation with X applied outermost, matching an XYZ Euler order
    pub fn to_quat(&self) -> Quat {
        Quat::from_euler(EulerRot::XYZ, self.x, self.y, 0.0)
    }
}

#[derive(Debug)]
pub enum ViewerState {
    /// No load running and no model; either no target yet or waiting for visibility
    Idle,
    Loading {
        token: RequestToken,
        target: ModelTarget,
    },
    Ready {
        token: RequestToken,
        target: ModelTarget,
        model: SceneNode,
    },
    Failed {
        token: RequestToken,
        target: ModelTarget,
        error: LoadError,
    },
}

/// Outcome of reporting a finished load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The model is now current
    Attached,
    /// The load failed and the viewer moved to `Failed`
    Failed,
    /// The result belonged to a superseded request and was dropped
    Stale,
}

#[derive(Debug)]
pub struct RotatingViewer {
    target: Option<ModelTarget>,
    state: ViewerState,
    visible: bool,
    latest: u64,
    orientation: Orientation,
    spin_increment: f32,
}

impl RotatingViewer {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            target: None,
            state: ViewerState::Idle,
            visible: config.visible,
            latest: 0,
            orientation: Orientation::default(),
            spin_increment: config.spin_increment,
        }
    }

    /// Point the viewer at a model (on mount, or when url/format change)
    ///
    /// Setting the current target again is a no-op. A new target detaches
    /// the current model right away; nothing is shown until the new load
    /// completes.
    pub fn set_target(&mut self, url: impl Into<String>, format: ModelFormat) -> Option<LoadTicket> {
        let target = ModelTarget {
            url: url.into(),
            format,
        };

        if self.target.as_ref() == Some(&target) {
            return None;
        }

        info!(url = %target.url, format = %format, "Viewer target changed");
        self.target = Some(target);
        self.state = ViewerState::Idle;
        self.orientation = Orientation::default();
        self.maybe_start()
    }

    /// Gate loading on visibility
    ///
    /// Hiding never clears a loaded model or aborts a running load, and
    /// showing again never reloads a model that is already present.
    pub fn set_visible(&mut self, visible: bool) -> Option<LoadTicket> {
        if self.visible != visible {
            debug!(visible, "Viewer visibility changed");
        }
        self.visible = visible;
        self.maybe_start()
    }

    /// Start over after a failed load
    pub fn retry(&mut self) -> Option<LoadTicket> {
        if !matches!(self.state, ViewerState::Failed { .. }) {
            return None;
        }
        self.state = ViewerState::Idle;
        self.maybe_start()
    }

    /// Report the result of the load identified by `token`
    pub fn complete(&mut self, token: RequestToken, result: Result<SceneNode, LoadError>) -> Completion {
        let target = match &self.state {
            ViewerState::Loading {
                token: waiting,
                target,
            } if *waiting == token && token.0 == self.latest => target.clone(),
            _ => {
                debug!(token = token.0, latest = self.latest, "Discarding stale load result");
                return Completion::Stale;
            }
        };

        match result {
            Ok(model) => {
                info!(url = %target.url, token = token.0, "Model attached");
                self.orientation = Orientation::default();
                self.state = ViewerState::Ready {
                    token,
                    target,
                    model,
                };
                Completion::Attached
            }
            Err(error) => {
                warn!(url = %target.url, token = token.0, error = %error, "Model failed to load");
                self.state = ViewerState::Failed {
                    token,
                    target,
                    error,
                };
                Completion::Failed
            }
        }
    }

    /// Spin the current model by one fixed step; returns whether a model spun
    ///
    /// The step is per frame, not per second, so spin speed follows frame rate.
    pub fn advance_frame(&mut self) -> bool {
        if !matches!(self.state, ViewerState::Ready { .. }) {
            return false;
        }
        self.orientation.x = (self.orientation.x + self.spin_increment).rem_euclid(TAU);
        self.orientation.y = (self.orientation.y + self.spin_increment).rem_euclid(TAU);
        true
    }

    fn maybe_start(&mut self) -> Option<LoadTicket> {
        if !self.visible || !matches!(self.state, ViewerState::Idle) {
            return None;
        }
        let target = self.target.clone()?;

        self.latest += 1;
        let token = RequestToken(self.latest);
        debug!(url = %target.url, token = token.0, "Starting model load");
        self.state = ViewerState::Loading {
            token,
            target: target.clone(),
        };
        Some(LoadTicket { token, target })
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn target(&self) -> Option<&ModelTarget> {
        self.target.as_ref()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, ViewerState::Loading { .. })
    }

    /// The attached model, if any
    pub fn current_model(&self) -> Option<&SceneNode> {
        match &self.state {
            ViewerState::Ready { model, .. } => Some(model),
            _ => None,
        }
    }

    /// Token of the attached model, if any
    pub fn current_token(&self) -> Option<RequestToken> {
        match &self.state {
            ViewerState::Ready { token, .. } => Some(*token),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&LoadError> {
        match &self.state {
            ViewerState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    fn viewer() -> RotatingViewer {
        RotatingViewer::new(&ViewerConfig::default())
    }

    fn model(name: &str) -> SceneNode {
        SceneNode::new(name, NodeKind::Group)
    }

    #[test]
    fn test_mount_starts_loading() {
        let mut viewer = viewer();
        assert!(matches!(viewer.state(), ViewerState::Idle));

        let ticket = viewer.set_target("duck.gltf", ModelFormat::Gltf).unwrap();
        assert_eq!(ticket.target.url, "duck.gltf");
        assert!(viewer.is_loading());

        assert_eq!(viewer.complete(ticket.token, Ok(model("duck"))), Completion::Attached);
        assert_eq!(viewer.current_model().map(|m| m.name.as_str()), Some("duck"));
        assert_eq!(viewer.current_token(), Some(ticket.token));
    }

    #[test]
    fn test_same_target_is_noop() {
        let mut viewer = viewer();
        let ticket = viewer.set_target("duck.gltf", ModelFormat::Gltf).unwrap();
        assert!(viewer.set_target("duck.gltf", ModelFormat::Gltf).is_none());
        viewer.complete(ticket.token, Ok(model("duck")));
        assert!(viewer.set_target("duck.gltf", ModelFormat::Gltf).is_none());
        assert!(viewer.current_model().is_some());
    }

    #[test]
    fn test_last_request_wins() {
        let mut viewer = viewer();
        let first = viewer.set_target("a.obj", ModelFormat::Obj).unwrap();
        let second = viewer.set_target("b.fbx", ModelFormat::Fbx).unwrap();
        assert!(second.token > first.token);

        // The newer load finishes first, then the older one arrives late
        assert_eq!(viewer.complete(second.token, Ok(model("b"))), Completion::Attached);
        assert_eq!(viewer.complete(first.token, Ok(model("a"))), Completion::Stale);
        assert_eq!(viewer.current_model().map(|m| m.name.as_str()), Some("b"));
    }

    #[test]
    fn test_stale_result_never_attached_while_loading() {
        let mut viewer = viewer();
        let first = viewer.set_target("a.obj", ModelFormat::Obj).unwrap();
        let second = viewer.set_target("b.obj", ModelFormat::Obj).unwrap();

        assert_eq!(viewer.complete(first.token, Ok(model("a"))), Completion::Stale);
        assert!(viewer.current_model().is_none());
        assert!(viewer.is_loading());

        assert_eq!(viewer.complete(second.token, Ok(model("b"))), Completion::Attached);
        assert_eq!(viewer.current_model().map(|m| m.name.as_str()), Some("b"));
    }

    #[test]
    fn test_new_target_detaches_current_model() {
        let mut viewer = viewer();
        let first = viewer.set_target("a.obj", ModelFormat::Obj).unwrap();
        viewer.complete(first.token, Ok(model("a")));

        viewer.set_target("b.obj", ModelFormat::Obj).unwrap();
        assert!(viewer.current_model().is_none());
        assert!(viewer.current_token().is_none());
    }

    #[test]
    fn test_failure_is_visible_state() {
        let mut viewer = viewer();
        let ticket = viewer.set_target("broken.fbx", ModelFormat::Fbx).unwrap();
        let completion = viewer.complete(ticket.token, Err(LoadError::Fbx("bad magic".to_string())));
        assert_eq!(completion, Completion::Failed);
        assert!(matches!(viewer.error(), Some(LoadError::Fbx(_))));
        assert!(!viewer.advance_frame());

        let retry = viewer.retry().unwrap();
        assert!(retry.token > ticket.token);
        assert_eq!(retry.target, ticket.target);
        assert!(viewer.retry().is_none());
    }

    #[test]
    fn test_hidden_viewer_waits_for_visibility() {
        let mut viewer = RotatingViewer::new(&ViewerConfig {
            visible: false,
            ..ViewerConfig::default()
        });

        assert!(viewer.set_target("duck.gltf", ModelFormat::Gltf).is_none());
        assert!(matches!(viewer.state(), ViewerState::Idle));

        let ticket = viewer.set_visible(true).unwrap();
        assert_eq!(ticket.target.url, "duck.gltf");
        assert!(viewer.set_visible(true).is_none());
    }

    #[test]
    fn test_visibility_toggle_keeps_loaded_model() {
        let mut viewer = viewer();
        let ticket = viewer.set_target("duck.gltf", ModelFormat::Gltf).unwrap();
        viewer.complete(ticket.token, Ok(model("duck")));

        assert!(viewer.set_visible(false).is_none());
        assert_eq!(viewer.current_token(), Some(ticket.token));
        assert!(viewer.set_visible(true).is_none());
        assert_eq!(viewer.current_token(), Some(ticket.token));
    }

    #[test]
    fn test_hiding_does_not_abort_running_load() {
        let mut viewer = viewer();
        let ticket = viewer.set_target("duck.gltf", ModelFormat::Gltf).unwrap();
        assert!(viewer.set_visible(false).is_none());
        assert_eq!(viewer.complete(ticket.token, Ok(model("duck"))), Completion::Attached);
    }

    #[test]
    fn test_spin_only_when_ready() {
        let mut viewer = viewer();
        assert!(!viewer.advance_frame());

        let ticket = viewer.set_target("duck.gltf", ModelFormat::Gltf).unwrap();
        assert!(!viewer.advance_frame());
        assert_eq!(viewer.orientation(), Orientation::default());

        viewer.complete(ticket.token, Ok(model("duck")));
        for _ in 0..100 {
            assert!(viewer.advance_frame());
        }
        let orientation = viewer.orientation();
        assert!((orientation.x - 1.0).abs() < 1e-4);
        assert!((orientation.y - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_spin_wraps() {
        let mut viewer = RotatingViewer::new(&ViewerConfig {
            spin_increment: 1.0,
            ..ViewerConfig::default()
        });
        let ticket = viewer.set_target("duck.gltf", ModelFormat::Gltf).unwrap();
        viewer.complete(ticket.token, Ok(model("duck")));

        for _ in 0..7 {
            viewer.advance_frame();
        }
        let expected = 7.0f32.rem_euclid(TAU);
        assert!((viewer.orientation().x - expected).abs() < 1e-4);
        assert!(viewer.orientation().x < TAU);
    }

    #[test]
    fn test_orientation_quat() {
        let orientation = Orientation { x: 0.3, y: 0.0 };
        assert!(orientation.to_quat().abs_diff_eq(Quat::from_rotation_x(0.3), 1e-6));
    }
}
