//! Auto-advancing image rotations.
//!
//! Every `.project-image.slideshow` with two or more images rotates its
//! `active` image on a timer. Two policies exist:
//!
//! - [`SlideshowPolicy::Synchronized`]: one repeating task advances every
//!   slideshow in the same callback, so they all switch together.
//! - [`SlideshowPolicy::Jittered`]: each slideshow draws its own interval
//!   once from `[min, max)` and runs its own task, so they drift apart.
//!
//! Slideshows with fewer than two images are counted but never touched.

use crate::config::{SlideshowConfig, SlideshowPolicyKind};
use crate::dom::{Document, ElementId, Selector, SelectorError};
use crate::runtime::{RepeatingTask, Scheduler, TaskKind};
use rand::Rng;
use std::time::Duration;
use tracing::{debug, warn};

const ACTIVE_CLASS: &str = "active";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideshowPolicy {
    Synchronized { interval: Duration },
    Jittered { min: Duration, max: Duration },
}

impl SlideshowPolicy {
    pub fn from_config(config: &SlideshowConfig) -> Self {
        match config.policy {
            SlideshowPolicyKind::Synchronized => SlideshowPolicy::Synchronized {
                interval: Duration::from_millis(config.interval_ms),
            },
            SlideshowPolicyKind::Jittered => SlideshowPolicy::Jittered {
                min: Duration::from_millis(config.jitter_min_ms),
                max: Duration::from_millis(config.jitter_max_ms),
            },
        }
    }
}

/// Uniform in `[min, max)`, never zero. An empty range yields `min`.
fn jittered_interval<R: Rng>(min: Duration, max: Duration, rng: &mut R) -> Duration {
    let (min_ms, max_ms) = (min.as_millis() as u64, max.as_millis() as u64);
    let ms = if max_ms > min_ms {
        rng.random_range(min_ms..max_ms)
    } else {
        min_ms
    };
    Duration::from_millis(ms.max(1))
}

/// One rotating image set.
#[derive(Debug, Clone)]
pub struct Slideshow {
    root: ElementId,
    images: Vec<ElementId>,
    current: usize,
    /// Own timer under the jittered policy.
    task: Option<RepeatingTask>,
}

impl Slideshow {
    pub fn root(&self) -> ElementId {
        self.root
    }

    pub fn images(&self) -> &[ElementId] {
        &self.images
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Interval drawn for this slideshow, if it runs its own timer.
    pub fn interval(&self) -> Option<Duration> {
        self.task.as_ref().map(RepeatingTask::interval)
    }

    fn advance(&mut self, doc: &mut Document) {
        doc.remove_class(self.images[self.current], ACTIVE_CLASS);
        self.current = (self.current + 1) % self.images.len();
        doc.add_class(self.images[self.current], ACTIVE_CLASS);
    }

    fn project(&self, doc: &mut Document) {
        for (i, image) in self.images.iter().enumerate() {
            doc.toggle_class(*image, ACTIVE_CLASS, i == self.current);
        }
    }
}

#[derive(Debug)]
pub struct SlideshowScheduler {
    policy: SlideshowPolicy,
    slideshows: Vec<Slideshow>,
    inert: usize,
    shared: Option<RepeatingTask>,
}

impl SlideshowScheduler {
    /// Find every slideshow and mark its first image active. Nothing is
    /// scheduled until [`start`](Self::start).
    pub fn bind(doc: &mut Document, policy: SlideshowPolicy) -> Result<Self, SelectorError> {
        let root_selector = Selector::parse(".project-image.slideshow")?;
        let image_selector = Selector::parse("img")?;
        let mut slideshows = Vec::new();
        let mut inert = 0;
        for root in doc.query_all(doc.root(), &root_selector) {
            let images = doc.query_all(root, &image_selector);
            if images.len() <= 1 {
                inert += 1;
                continue;
            }
            let slideshow = Slideshow {
                root,
                images,
                current: 0,
                task: None,
            };
            slideshow.project(doc);
            slideshows.push(slideshow);
        }
        Ok(Self {
            policy,
            slideshows,
            inert,
            shared: None,
        })
    }

    pub fn policy(&self) -> SlideshowPolicy {
        self.policy
    }

    pub fn slideshows(&self) -> &[Slideshow] {
        &self.slideshows
    }

    /// Slideshows with fewer than two images.
    pub fn inert(&self) -> usize {
        self.inert
    }

    /// Arm the timers. Jittered intervals are drawn on the first start and
    /// kept across restarts.
    pub fn start<R: Rng>(&mut self, scheduler: &mut Scheduler, rng: &mut R) {
        if self.slideshows.is_empty() {
            return;
        }
        match self.policy {
            SlideshowPolicy::Synchronized { interval } => {
                if interval.is_zero() {
                    warn!("slideshow interval is zero; slideshows stay still");
                    return;
                }
                self.shared
                    .get_or_insert_with(|| RepeatingTask::new(interval, TaskKind::AdvanceAllSlideshows))
                    .start(scheduler);
            }
            SlideshowPolicy::Jittered { min, max } => {
                for (index, slideshow) in self.slideshows.iter_mut().enumerate() {
                    let task = slideshow.task.get_or_insert_with(|| {
                        RepeatingTask::new(jittered_interval(min, max, rng), TaskKind::AdvanceSlideshow(index))
                    });
                    task.start(scheduler);
                }
            }
        }
        debug!(count = self.slideshows.len(), policy = ?self.policy, "slideshows started");
    }

    /// Cancel every timer.
    pub fn stop(&mut self, scheduler: &mut Scheduler) {
        if let Some(task) = &mut self.shared {
            task.stop(scheduler);
        }
        for slideshow in &mut self.slideshows {
            if let Some(task) = &mut slideshow.task {
                task.stop(scheduler);
            }
        }
    }

    /// Number of armed timers.
    pub fn running_tasks(&self, scheduler: &Scheduler) -> usize {
        self.shared
            .iter()
            .chain(self.slideshows.iter().filter_map(|s| s.task.as_ref()))
            .filter(|t| t.is_running(scheduler))
            .count()
    }

    /// Advance every slideshow by one image.
    pub fn tick_all(&mut self, doc: &mut Document) {
        for slideshow in &mut self.slideshows {
            slideshow.advance(doc);
        }
    }

    /// Advance one slideshow by one image.
    pub fn tick(&mut self, doc: &mut Document, index: usize) {
        if let Some(slideshow) = self.slideshows.get_mut(index) {
            slideshow.advance(doc);
        }
    }

    /// Run a fired timer. Returns false for tasks this scheduler doesn't own.
    pub fn handle_task(&mut self, doc: &mut Document, kind: TaskKind) -> bool {
        match kind {
            TaskKind::AdvanceAllSlideshows => self.tick_all(doc),
            TaskKind::AdvanceSlideshow(index) => self.tick(doc, index),
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{NodeSpec, PageSpec};
    use crate::test_helpers::slideshow;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn page(nodes: Vec<NodeSpec>) -> Document {
        PageSpec::new("https://tuuli.cz/projekty/").body(nodes).to_document()
    }

    fn synchronized() -> SlideshowPolicy {
        SlideshowPolicy::Synchronized {
            interval: Duration::from_millis(4000),
        }
    }

    fn active(doc: &Document, s: &Slideshow) -> Vec<usize> {
        s.images()
            .iter()
            .enumerate()
            .filter(|(_, img)| doc.has_class(**img, "active"))
            .map(|(i, _)| i)
            .collect()
    }

    fn run(doc: &mut Document, scheduler: &mut Scheduler, shows: &mut SlideshowScheduler, ms: u64) {
        let until = scheduler.now() + Duration::from_millis(ms);
        while let Some((_, kind)) = scheduler.pop_due(until) {
            shows.handle_task(doc, kind);
        }
        scheduler.settle(until);
    }

    #[test]
    fn policy_from_config() {
        let mut config = SlideshowConfig::default();
        assert_eq!(SlideshowPolicy::from_config(&config), synchronized());
        config.policy = SlideshowPolicyKind::Jittered;
        assert_eq!(
            SlideshowPolicy::from_config(&config),
            SlideshowPolicy::Jittered {
                min: Duration::from_millis(3000),
                max: Duration::from_millis(5000),
            }
        );
    }

    #[test]
    fn bind_marks_first_image_active() {
        let mut doc = page(vec![slideshow(3)]);
        let shows = SlideshowScheduler::bind(&mut doc, synchronized()).unwrap();
        assert_eq!(active(&doc, &shows.slideshows()[0]), vec![0]);
    }

    #[test]
    fn synchronized_advances_all_in_one_tick() {
        let mut doc = page(vec![slideshow(3), slideshow(4)]);
        let mut scheduler = Scheduler::new();
        let mut shows = SlideshowScheduler::bind(&mut doc, synchronized()).unwrap();
        shows.start(&mut scheduler, &mut StdRng::seed_from_u64(1));
        assert_eq!(scheduler.pending(), 1);

        run(&mut doc, &mut scheduler, &mut shows, 4000);
        assert_eq!(active(&doc, &shows.slideshows()[0]), vec![1]);
        assert_eq!(active(&doc, &shows.slideshows()[1]), vec![1]);

        // 3 images wrap after three ticks, 4 images don't.
        run(&mut doc, &mut scheduler, &mut shows, 8000);
        assert_eq!(shows.slideshows()[0].current_index(), 0);
        assert_eq!(shows.slideshows()[1].current_index(), 3);
        assert_eq!(active(&doc, &shows.slideshows()[1]), vec![3]);
    }

    #[test]
    fn single_image_slideshows_are_inert() {
        let mut doc = page(vec![slideshow(1), slideshow(0)]);
        let mut scheduler = Scheduler::new();
        let mut shows = SlideshowScheduler::bind(&mut doc, synchronized()).unwrap();
        shows.start(&mut scheduler, &mut StdRng::seed_from_u64(1));
        assert_eq!(shows.inert(), 2);
        assert!(shows.slideshows().is_empty());
        assert_eq!(scheduler.pending(), 0);
        let img = doc.select_all("img").unwrap()[0];
        assert!(!doc.has_class(img, "active"));
    }

    #[test]
    fn jittered_draws_interval_per_slideshow() {
        let mut doc = page(vec![slideshow(2), slideshow(3), slideshow(2)]);
        let mut scheduler = Scheduler::new();
        let mut shows = SlideshowScheduler::bind(
            &mut doc,
            SlideshowPolicy::Jittered {
                min: Duration::from_millis(3000),
                max: Duration::from_millis(5000),
            },
        )
        .unwrap();
        shows.start(&mut scheduler, &mut StdRng::seed_from_u64(7));
        assert_eq!(scheduler.pending(), 3);
        for s in shows.slideshows() {
            let interval = s.interval().unwrap();
            assert!(interval >= Duration::from_millis(3000));
            assert!(interval < Duration::from_millis(5000));
        }

        let first = shows.slideshows()[0].interval().unwrap();
        run(&mut doc, &mut scheduler, &mut shows, first.as_millis() as u64);
        assert_eq!(shows.slideshows()[0].current_index(), 1);
        for s in shows.slideshows() {
            assert_eq!(active(&doc, s).len(), 1);
        }
    }

    #[test]
    fn jittered_empty_range_uses_min() {
        let mut doc = page(vec![slideshow(2), slideshow(2)]);
        let mut scheduler = Scheduler::new();
        let mut shows = SlideshowScheduler::bind(
            &mut doc,
            SlideshowPolicy::Jittered {
                min: Duration::from_millis(4000),
                max: Duration::from_millis(4000),
            },
        )
        .unwrap();
        shows.start(&mut scheduler, &mut StdRng::seed_from_u64(7));
        assert_eq!(scheduler.pending(), 2);
        for s in shows.slideshows() {
            assert_eq!(s.interval(), Some(Duration::from_millis(4000)));
        }

        run(&mut doc, &mut scheduler, &mut shows, 4000);
        assert!(shows.slideshows().iter().all(|s| s.current_index() == 1));
    }

    #[test]
    fn jittered_inverted_range_uses_min() {
        let mut rng = StdRng::seed_from_u64(1);
        let min = Duration::from_millis(5000);
        assert_eq!(jittered_interval(min, Duration::from_millis(3000), &mut rng), min);
        assert_eq!(
            jittered_interval(Duration::ZERO, Duration::ZERO, &mut rng),
            Duration::from_millis(1)
        );
    }

    #[test]
    fn zero_interval_does_not_start() {
        let mut doc = page(vec![slideshow(3)]);
        let mut scheduler = Scheduler::new();
        let mut shows = SlideshowScheduler::bind(
            &mut doc,
            SlideshowPolicy::Synchronized {
                interval: Duration::ZERO,
            },
        )
        .unwrap();
        shows.start(&mut scheduler, &mut StdRng::seed_from_u64(1));
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(shows.running_tasks(&scheduler), 0);
    }

    #[test]
    fn restart_keeps_drawn_intervals() {
        let mut doc = page(vec![slideshow(2)]);
        let mut scheduler = Scheduler::new();
        let mut shows = SlideshowScheduler::bind(
            &mut doc,
            SlideshowPolicy::Jittered {
                min: Duration::from_millis(3000),
                max: Duration::from_millis(5000),
            },
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        shows.start(&mut scheduler, &mut rng);
        let drawn = shows.slideshows()[0].interval();
        shows.stop(&mut scheduler);
        shows.start(&mut scheduler, &mut rng);
        assert_eq!(shows.slideshows()[0].interval(), drawn);
    }

    #[test]
    fn stop_cancels_everything() {
        let mut doc = page(vec![slideshow(3)]);
        let mut scheduler = Scheduler::new();
        let mut shows = SlideshowScheduler::bind(&mut doc, synchronized()).unwrap();
        shows.start(&mut scheduler, &mut StdRng::seed_from_u64(1));
        shows.stop(&mut scheduler);
        assert_eq!(shows.running_tasks(&scheduler), 0);
        run(&mut doc, &mut scheduler, &mut shows, 20_000);
        assert_eq!(shows.slideshows()[0].current_index(), 0);
    }

    #[test]
    fn foreign_tasks_are_not_handled() {
        let mut doc = page(vec![slideshow(2)]);
        let mut shows = SlideshowScheduler::bind(&mut doc, synchronized()).unwrap();
        assert!(!shows.handle_task(&mut doc, TaskKind::RemoveConsentBanner));
    }
}
