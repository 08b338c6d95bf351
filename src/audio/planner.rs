//! Conversion planning
//!
//! Decides which converters a source/destination spec pair needs and in
//! what order. Attributes are visited in the fixed priority order
//! channel count -> format -> rate. An attribute that shrinks is converted
//! on the way down (before the lower-priority attributes), one that grows
//! on the way back up (after them), so every step works on the smallest
//! data it can.

use crate::audio::{SampleSpec, SpecItem};
use std::cmp::Ordering;
use std::fmt;

/// One converter invocation in a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanStep {
    /// Attribute this step converts
    pub item: SpecItem,
    /// Spec the step consumes
    pub src: SampleSpec,
    /// Spec the step produces
    pub dst: SampleSpec,
}

/// Ordered list of at most three converter steps
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionPlan {
    steps: Vec<PlanStep>,
}

impl ConversionPlan {
    /// Build the plan turning `src` into `dst`
    ///
    /// An empty plan means the specs are identical.
    pub fn new(src: &SampleSpec, dst: &SampleSpec) -> Self {
        let mut running = *src;
        let mut steps = Vec::with_capacity(SpecItem::ORDERED.len());

        // Descent: shrink early
        for item in SpecItem::ORDERED {
            if running.compare_item(dst, item) == Ordering::Greater {
                steps.push(Self::step(&mut running, dst, item));
            }
        }

        // Ascent: grow late, innermost attribute first
        for item in SpecItem::ORDERED.into_iter().rev() {
            if running.compare_item(dst, item) == Ordering::Less {
                steps.push(Self::step(&mut running, dst, item));
            }
        }

        debug_assert_eq!(running, *dst);
        Self { steps }
    }

    fn step(running: &mut SampleSpec, dst: &SampleSpec, item: SpecItem) -> PlanStep {
        let next = running.with_item_from(item, dst);
        let step = PlanStep {
            item,
            src: *running,
            dst: next,
        };
        *running = next;
        step
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Attributes converted, in execution order
    pub fn items(&self) -> Vec<SpecItem> {
        self.steps.iter().map(|s| s.item).collect()
    }
}

impl fmt::Display for ConversionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("passthrough");
        }
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}[{} => {}]", step.item, step.src, step.dst)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SampleFormat;

    fn spec(rate: u32, format: SampleFormat, channels: u32) -> SampleSpec {
        SampleSpec::new(rate, format, channels).unwrap()
    }

    fn assert_chained(plan: &ConversionPlan, src: &SampleSpec, dst: &SampleSpec) {
        let steps = plan.steps();
        assert_eq!(steps.first().unwrap().src, *src);
        assert_eq!(steps.last().unwrap().dst, *dst);
        for pair in steps.windows(2) {
            assert_eq!(pair[0].dst, pair[1].src);
        }
        for step in steps {
            // Each step touches exactly its own attribute
            assert_eq!(step.src.differing_items(&step.dst), vec![step.item]);
        }
    }

    #[test]
    fn test_identical_specs_give_empty_plan() {
        let s = spec(48_000, SampleFormat::S16, 2);
        let plan = ConversionPlan::new(&s, &s);
        assert!(plan.is_empty());
        assert_eq!(plan.to_string(), "passthrough");
    }

    #[test]
    fn test_all_shrinking_converts_in_priority_order() {
        let src = spec(44_100, SampleFormat::S16, 2);
        let dst = spec(8_000, SampleFormat::U8, 1);
        let plan = ConversionPlan::new(&src, &dst);

        assert_eq!(
            plan.items(),
            vec![SpecItem::ChannelCount, SpecItem::Format, SpecItem::Rate]
        );
        assert_chained(&plan, &src, &dst);
        assert_eq!(plan.steps()[0].dst, spec(44_100, SampleFormat::S16, 1));
        assert_eq!(plan.steps()[1].dst, spec(44_100, SampleFormat::U8, 1));
    }

    #[test]
    fn test_all_growing_converts_late() {
        let src = spec(8_000, SampleFormat::U8, 1);
        let dst = spec(44_100, SampleFormat::S16, 2);
        let plan = ConversionPlan::new(&src, &dst);

        // Growth is inserted on the way back out, so the narrowest data is
        // resampled first and channels are added last
        assert_eq!(
            plan.items(),
            vec![SpecItem::Rate, SpecItem::Format, SpecItem::ChannelCount]
        );
        assert_chained(&plan, &src, &dst);
        assert_eq!(plan.steps()[0].dst, spec(44_100, SampleFormat::U8, 1));
    }

    #[test]
    fn test_mixed_directions() {
        // More channels, narrower samples, lower rate
        let src = spec(48_000, SampleFormat::S16, 1);
        let dst = spec(16_000, SampleFormat::U8, 2);
        let plan = ConversionPlan::new(&src, &dst);

        assert_eq!(
            plan.items(),
            vec![SpecItem::Format, SpecItem::Rate, SpecItem::ChannelCount]
        );
        assert_chained(&plan, &src, &dst);
    }

    #[test]
    fn test_single_attribute() {
        let src = spec(48_000, SampleFormat::S16, 2);
        let dst = spec(44_100, SampleFormat::S16, 2);
        let plan = ConversionPlan::new(&src, &dst);
        assert_eq!(plan.items(), vec![SpecItem::Rate]);
        assert_chained(&plan, &src, &dst);
    }
}
