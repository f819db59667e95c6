//! Timed viewport animations
//!
//! Animations are driven by the host: it calls
//! [`TilesView::tick`](crate::TilesView::tick) with the current time on every
//! frame, and the view moves the viewport to where the animation should be.

use crate::viewport::ViewportState;
use std::fmt;
use std::time::{Duration, Instant};
use tileview_render::Point;

/// Deceleration curve, fast start and soft landing
pub fn decelerate(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t) * (1.0 - t)
}

fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}

/// How an animation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationEnd {
    Finished,
    /// Interrupted by a touch or replaced by another animation
    Cancelled,
}

/// Notified once when an animation started with
/// [`TilesView::animate_to`](crate::TilesView::animate_to) ends
pub trait AnimationCallback {
    fn on_animation_finish(&self) {}

    fn on_animation_cancel(&self) {}
}

impl<F> AnimationCallback for F
where
    F: Fn(AnimationEnd),
{
    fn on_animation_finish(&self) {
        self(AnimationEnd::Finished)
    }

    fn on_animation_cancel(&self) {
        self(AnimationEnd::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Motion {
    /// Change the scale keeping a point of the view fixed
    Scale { from: f32, to: f32, focus: Point },
    /// Move a content point to the center of the content box while scaling
    Center {
        from_scale: f32,
        to_scale: f32,
        from: Point,
        to: Point,
    },
}

impl Motion {
    pub(crate) fn target_scale(&self) -> f32 {
        match *self {
            Motion::Scale { to, .. } => to,
            Motion::Center { to_scale, .. } => to_scale,
        }
    }

    /// Move the viewport to progress `t` of the motion
    pub(crate) fn apply(&self, viewport: &mut ViewportState, t: f32) {
        match *self {
            Motion::Scale { from, to, focus } => {
                viewport.scale_around(lerp(from, to, t), focus.x, focus.y);
            }
            Motion::Center {
                from_scale,
                to_scale,
                from,
                to,
            } => {
                let scale = lerp(from_scale, to_scale, t);
                let center = Point::new(lerp(from.x, to.x, t), lerp(from.y, to.y, t));
                let offset = viewport.offset_centering(center.x, center.y, scale);
                viewport.scale = scale;
                viewport.offset_x = offset.x;
                viewport.offset_y = offset.y;
            }
        }
    }
}

/// What the view does when an animation completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FollowUp {
    Nothing,
    /// Snap to the zoom level of the final scale
    Settle,
}

pub(crate) struct Animation {
    pub motion: Motion,
    pub start: Instant,
    pub duration: Duration,
    pub follow_up: FollowUp,
    pub callback: Option<Box<dyn AnimationCallback>>,
}

impl Animation {
    pub fn new(motion: Motion, start: Instant, duration: Duration, follow_up: FollowUp) -> Self {
        Self {
            motion,
            start,
            duration,
            follow_up,
            callback: None,
        }
    }

    pub fn with_callback(mut self, callback: Option<Box<dyn AnimationCallback>>) -> Self {
        self.callback = callback;
        self
    }

    /// Linear progress in `[0, 1]`
    pub fn elapsed_fraction(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.start);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
    }

    /// Eased progress in `[0, 1]`
    pub fn progress(&self, now: Instant) -> f32 {
        decelerate(self.elapsed_fraction(now))
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        self.elapsed_fraction(now) >= 1.0
    }

    pub fn finish(self) {
        if let Some(callback) = self.callback {
            callback.on_animation_finish();
        }
    }

    pub fn cancel(self) {
        if let Some(callback) = self.callback {
            callback.on_animation_cancel();
        }
    }
}

impl fmt::Debug for Animation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Animation")
            .field("motion", &self.motion)
            .field("start", &self.start)
            .field("duration", &self.duration)
            .field("follow_up", &self.follow_up)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Insets;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_decelerate() {
        assert_eq!(decelerate(0.0), 0.0);
        assert_eq!(decelerate(0.5), 0.75);
        assert_eq!(decelerate(1.0), 1.0);
        assert_eq!(decelerate(3.0), 1.0);
    }

    #[test]
    fn test_progress() {
        let start = Instant::now();
        let animation = Animation::new(
            Motion::Scale {
                from: 1.0,
                to: 2.0,
                focus: Point::default(),
            },
            start,
            Duration::from_millis(200),
            FollowUp::Nothing,
        );

        assert_eq!(animation.progress(start), 0.0);
        assert!((animation.progress(start + Duration::from_millis(100)) - 0.75).abs() < 1e-5);
        assert!(!animation.is_finished(start + Duration::from_millis(199)));
        assert!(animation.is_finished(start + Duration::from_millis(200)));
        assert_eq!(animation.progress(start + Duration::from_secs(5)), 1.0);
    }

    #[test]
    fn test_zero_duration_is_finished() {
        let start = Instant::now();
        let animation = Animation::new(
            Motion::Scale {
                from: 1.0,
                to: 2.0,
                focus: Point::default(),
            },
            start,
            Duration::ZERO,
            FollowUp::Nothing,
        );
        assert!(animation.is_finished(start));
    }

    #[test]
    fn test_center_motion() {
        let mut viewport = ViewportState::new(800.0, 600.0, Insets::ZERO);
        let motion = Motion::Center {
            from_scale: 1.0,
            to_scale: 2.0,
            from: Point::new(400.0, 300.0),
            to: Point::new(100.0, 100.0),
        };

        motion.apply(&mut viewport, 1.0);
        assert_eq!(viewport.scale, 2.0);
        // Content point (100, 100) sits in the middle of the view
        assert_eq!(viewport.content_to_view(100.0, 100.0), Point::new(400.0, 300.0));

        motion.apply(&mut viewport, 0.0);
        assert_eq!(viewport.scale, 1.0);
        assert_eq!((viewport.offset_x, viewport.offset_y), (0.0, 0.0));
    }

    #[test]
    fn test_callbacks() {
        let ends = Rc::new(RefCell::new(Vec::new()));
        let make = |ends: Rc<RefCell<Vec<AnimationEnd>>>| {
            let callback: Box<dyn AnimationCallback> =
                Box::new(move |end: AnimationEnd| ends.borrow_mut().push(end));
            Animation::new(
                Motion::Scale {
                    from: 1.0,
                    to: 1.0,
                    focus: Point::default(),
                },
                Instant::now(),
                Duration::ZERO,
                FollowUp::Nothing,
            )
            .with_callback(Some(callback))
        };

        make(ends.clone()).finish();
        make(ends.clone()).cancel();
        assert_eq!(*ends.borrow(), vec![AnimationEnd::Finished, AnimationEnd::Cancelled]);
    }
}
