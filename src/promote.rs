//! Promotion engine: relabels a composed hit's family when its guard
//! expression passes and its score clears the rule's threshold.

use std::collections::HashMap;

use crate::bundle::Bundle;
use crate::compose::ComposedHit;
use crate::expr::Activation;
use crate::sink::WarningSink;

/// Apply every matching promotion rule to `hits` in place. A rule applies
/// to a composed hit whose `marker_id` equals the rule's key; the guard is
/// evaluated against a single-entry count map (`{hit.marker_id: 1}`) so
/// guards of the form `"marker_id"` or `"marker_id >= 1"` read naturally.
pub(crate) fn promote(hits: &mut [ComposedHit], bundle: &Bundle, sink: &dyn WarningSink) {
    for hit in hits.iter_mut() {
        let Some(rule) = bundle.promotions.get(&hit.marker_id) else { continue };

        if hit.score < rule.min_score {
            continue;
        }

        let guard = match Activation::parse(&rule.guard) {
            Ok(g) => g,
            Err(e) => {
                sink.activation_eval_warning(&hit.marker_id, &rule.guard, &e.to_string());
                continue;
            }
        };

        let mut counts = HashMap::new();
        counts.insert(hit.marker_id.clone(), 1.0f64);
        if guard.eval(&counts) {
            hit.family = rule.promote_to;
        }
    }
}
