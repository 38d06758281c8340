//! Per-date DST classification.
//!
//! `classify` is pure arithmetic on the rule (two "last Sunday" lookups), so
//! there is no cache: calling it twice for the same date always yields the
//! same `TransitionInfo`.

use chrono::{Datelike, NaiveDate};

use crate::domain::{TransitionInfo, TransitionKind};
use crate::time::rule::DstRule;

#[derive(Debug, Clone, Copy)]
pub struct TransitionCalendar {
    rule: DstRule,
}

impl TransitionCalendar {
    pub fn new(rule: DstRule) -> Self {
        Self { rule }
    }

    pub fn helsinki() -> Self {
        Self::new(DstRule::helsinki())
    }

    pub fn rule(&self) -> &DstRule {
        &self.rule
    }

    /// Classify the local calendar day `date`.
    pub fn classify(&self, date: NaiveDate) -> TransitionInfo {
        let rule = &self.rule;
        let year = date.year();
        let spring = rule.dst_start_date(year);
        let fall = rule.dst_end_date(year);
        let switch = date.and_time(rule.local_switch_time());

        if Some(date) == spring {
            return TransitionInfo {
                date,
                kind: TransitionKind::Loss,
                local_transition: Some(switch),
                offset_before: rule.standard_offset,
                offset_after: rule.dst_offset,
            };
        }

        if Some(date) == fall {
            return TransitionInfo {
                date,
                kind: TransitionKind::Gain,
                local_transition: Some(switch),
                offset_before: rule.dst_offset,
                offset_after: rule.standard_offset,
            };
        }

        let in_summer = match (spring, fall) {
            (Some(spring), Some(fall)) => date > spring && date < fall,
            _ => false,
        };
        let offset = if in_summer {
            rule.dst_offset
        } else {
            rule.standard_offset
        };

        TransitionInfo {
            date,
            kind: TransitionKind::None,
            local_transition: None,
            offset_before: offset,
            offset_after: offset,
        }
    }

    /// Both transition days of `year`, spring first.
    pub fn transitions(&self, year: i32) -> Vec<TransitionInfo> {
        [self.rule.dst_start_date(year), self.rule.dst_end_date(year)]
            .into_iter()
            .flatten()
            .map(|date| self.classify(date))
            .collect()
    }
}

impl Default for TransitionCalendar {
    fn default() -> Self {
        Self::helsinki()
    }
}
