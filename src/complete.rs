//! Specification completion: merge solver-chosen attributes into a partial
//! visualization spec.
//!
//! The spec is a nested key/value document (mark type, per-channel encodings)
//! owned by an external grammar; this module treats it as opaque but
//! mergeable. Completion only ever fills fields the caller left unset —
//! caller-supplied fields win at every path.

use serde::Serialize;
use serde_json::{json, Map, Value as Json};

use crate::decode::AnswerSet;
use crate::facts::Term;

// ---------------------------------------------------------------------------
// Specs
// ---------------------------------------------------------------------------

/// A partial or complete visualization specification.
///
/// Backed by a JSON object; not validated against the full grammar.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VisualizationSpec(Map<String, Json>);

impl VisualizationSpec {
    pub fn new() -> VisualizationSpec {
        VisualizationSpec::default()
    }

    /// Wrap an existing JSON object.
    pub fn from_json(value: Json) -> Option<VisualizationSpec> {
        match value {
            Json::Object(map) => Some(VisualizationSpec(map)),
            _ => None,
        }
    }

    /// Parse a spec from JSON text.
    pub fn from_json_str(input: &str) -> Option<VisualizationSpec> {
        serde_json::from_str(input).ok().and_then(Self::from_json)
    }

    /// The underlying JSON object.
    pub fn as_json(&self) -> &Map<String, Json> {
        &self.0
    }

    pub fn into_json(self) -> Json {
        Json::Object(self.0)
    }

    /// Look up a dotted path, e.g. `encoding.x.field`.
    pub fn get_path(&self, path: &str) -> Option<&Json> {
        let mut segments = path.split('.');
        let mut current = self.0.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}

/// Which model to complete against when the solver returned several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelSelection {
    /// The solver's first model.
    #[default]
    First,
    /// The model with the lowest optimization score; scoreless models rank last.
    BestByScore,
}

/// A completion outcome: the merged spec plus any grammar paths that were
/// needed but supplied by neither the caller nor the chosen answer set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedSpec {
    pub spec: VisualizationSpec,
    /// Needed paths still unset after the merge, e.g. `encoding.x.type`.
    pub unfilled: Vec<String>,
}

impl CompletedSpec {
    /// Whether every needed field ended up set.
    pub fn is_complete(&self) -> bool {
        self.unfilled.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Complete a partial spec against the given answer sets.
///
/// The selected answer set's decoded attributes are translated to grammar
/// paths and merged underneath the partial spec: existing caller fields are
/// never overwritten, at any depth. With no answer sets (or an empty one),
/// the partial spec comes back unchanged with its unfilled paths flagged.
pub fn complete_spec(
    partial: &VisualizationSpec,
    answer_sets: &[AnswerSet],
    selection: ModelSelection,
) -> CompletedSpec {
    let chosen = select_model(answer_sets, selection);

    let mut merged = partial.clone();
    if let Some(answer) = chosen {
        let derived = derive_spec(answer);
        merge_under(&mut merged.0, &derived);
        tracing::debug!(
            derived_literals = answer.literal_count(),
            score = answer.score(),
            "merged solver attributes into partial spec"
        );
    }

    let unfilled = unfilled_paths(&merged);
    if !unfilled.is_empty() {
        tracing::debug!(unfilled = ?unfilled, "completion left needed fields unset");
    }

    CompletedSpec {
        spec: merged,
        unfilled,
    }
}

fn select_model<'a>(answer_sets: &'a [AnswerSet], selection: ModelSelection) -> Option<&'a AnswerSet> {
    match selection {
        ModelSelection::First => answer_sets.first(),
        ModelSelection::BestByScore => answer_sets
            .iter()
            .min_by_key(|a| a.score().unwrap_or(i64::MAX)),
    }
}

/// Translate a decoded answer set into a spec fragment using the answer
/// vocabulary: `mark/1`, `channel/2`, `field/2`, `type/2`, `aggregate/2`,
/// `bin/2`, `zero/1`, `log/1`.
fn derive_spec(answer: &AnswerSet) -> Map<String, Json> {
    let mut root = Map::new();

    if let Some(mark) = answer.tuples("mark").first().and_then(|t| t.first()) {
        root.insert("mark".into(), Json::String(mark.as_text()));
    }

    // channel(E, C) names the encoding slot; the remaining predicates hang
    // their values off E.
    let mut encoding = Map::new();
    for tuple in answer.tuples("channel") {
        let [enc_id, channel] = tuple.as_slice() else {
            continue;
        };
        let mut slot = Map::new();

        if let Some(field) = lookup(answer, "field", enc_id) {
            slot.insert("field".into(), Json::String(field.as_text()));
        }
        if let Some(ftype) = lookup(answer, "type", enc_id) {
            slot.insert("type".into(), Json::String(ftype.as_text()));
        }
        if let Some(agg) = lookup(answer, "aggregate", enc_id) {
            slot.insert("aggregate".into(), Json::String(agg.as_text()));
        }
        if let Some(bin) = lookup(answer, "bin", enc_id) {
            if let Term::Int(maxbins) = bin {
                slot.insert("bin".into(), json!({ "maxbins": maxbins }));
            } else {
                slot.insert("bin".into(), Json::Bool(true));
            }
        }

        let mut scale = Map::new();
        if answer.tuples("zero").iter().any(|t| t.first() == Some(enc_id)) {
            scale.insert("zero".into(), Json::Bool(true));
        }
        if answer.tuples("log").iter().any(|t| t.first() == Some(enc_id)) {
            scale.insert("type".into(), Json::String("log".into()));
        }
        if !scale.is_empty() {
            slot.insert("scale".into(), Json::Object(scale));
        }

        encoding.insert(channel.as_text(), Json::Object(slot));
    }
    if !encoding.is_empty() {
        root.insert("encoding".into(), Json::Object(encoding));
    }

    root
}

/// First second-argument term of `predicate` whose first argument is `key`.
fn lookup<'a>(answer: &'a AnswerSet, predicate: &str, key: &Term) -> Option<&'a Term> {
    answer
        .tuples(predicate)
        .iter()
        .find(|t| t.first() == Some(key))
        .and_then(|t| t.get(1))
}

/// Merge `derived` underneath `target`: insert missing keys, recurse into
/// objects present on both sides, keep `target`'s value on any other clash.
fn merge_under(target: &mut Map<String, Json>, derived: &Map<String, Json>) {
    for (key, value) in derived {
        match target.get_mut(key) {
            None => {
                target.insert(key.clone(), value.clone());
            }
            Some(Json::Object(existing)) => {
                if let Json::Object(incoming) = value {
                    merge_under(existing, incoming);
                }
            }
            Some(_) => {} // caller-supplied scalar wins
        }
    }
}

/// Needed grammar paths still unset: `mark`, and `field`/`type` for every
/// declared encoding slot.
fn unfilled_paths(spec: &VisualizationSpec) -> Vec<String> {
    let mut unfilled = Vec::new();
    if spec.get_path("mark").is_none() {
        unfilled.push("mark".to_string());
    }
    if let Some(Json::Object(encoding)) = spec.get_path("encoding") {
        for (channel, slot) in encoding {
            let slot_obj = slot.as_object();
            for needed in ["field", "type"] {
                let present = slot_obj.is_some_and(|s| s.contains_key(needed));
                if !present {
                    unfilled.push(format!("encoding.{channel}.{needed}"));
                }
            }
        }
    }
    unfilled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_model;
    use crate::solver::RawModel;

    fn answer(literals: &[&str]) -> AnswerSet {
        decode_model(&RawModel::new(literals.iter().map(|s| s.to_string()).collect()))
    }

    fn spec(json: &str) -> VisualizationSpec {
        VisualizationSpec::from_json_str(json).unwrap()
    }

    #[test]
    fn fills_unset_fields_from_answer() {
        let partial = spec(r#"{"mark": "point"}"#);
        let a = answer(&["channel(e0,x)", "field(e0,gene)", "type(e0,nominal)"]);

        let completed = complete_spec(&partial, &[a], ModelSelection::First);
        assert_eq!(
            completed.spec.get_path("encoding.x.field"),
            Some(&Json::String("gene".into()))
        );
        assert_eq!(
            completed.spec.get_path("mark"),
            Some(&Json::String("point".into()))
        );
        assert!(completed.is_complete());
    }

    #[test]
    fn never_overwrites_caller_fields() {
        let partial = spec(r#"{"mark": "point", "encoding": {"x": {"field": "tissue"}}}"#);
        let a = answer(&[
            "mark(bar)",
            "channel(e0,x)",
            "field(e0,gene)",
            "type(e0,nominal)",
        ]);

        let completed = complete_spec(&partial, &[a], ModelSelection::First);
        // Caller's mark and x.field survive; the answer only adds x.type.
        assert_eq!(completed.spec.get_path("mark"), Some(&Json::String("point".into())));
        assert_eq!(
            completed.spec.get_path("encoding.x.field"),
            Some(&Json::String("tissue".into()))
        );
        assert_eq!(
            completed.spec.get_path("encoding.x.type"),
            Some(&Json::String("nominal".into()))
        );
    }

    #[test]
    fn missing_needed_fields_flagged_not_silently_completed() {
        let partial = spec(r#"{"encoding": {"y": {}}}"#);
        let completed = complete_spec(&partial, &[], ModelSelection::First);
        assert!(!completed.is_complete());
        assert!(completed.unfilled.contains(&"mark".to_string()));
        assert!(completed.unfilled.contains(&"encoding.y.field".to_string()));
        assert!(completed.unfilled.contains(&"encoding.y.type".to_string()));
        // The partial spec itself is unchanged.
        assert_eq!(completed.spec, partial);
    }

    #[test]
    fn best_by_score_picks_lowest() {
        let worse = decode_model(&RawModel::new(vec!["mark(bar)".into()]).with_score(9));
        let better = decode_model(&RawModel::new(vec!["mark(point)".into()]).with_score(2));

        let completed =
            complete_spec(&spec("{}"), &[worse, better], ModelSelection::BestByScore);
        assert_eq!(completed.spec.get_path("mark"), Some(&Json::String("point".into())));
    }

    #[test]
    fn scale_attributes_nest_under_slot() {
        let partial = spec("{}");
        let a = answer(&[
            "mark(point)",
            "channel(e0,y)",
            "field(e0,expr)",
            "type(e0,quantitative)",
            "zero(e0)",
            "log(e0)",
        ]);
        let completed = complete_spec(&partial, &[a], ModelSelection::First);
        assert_eq!(
            completed.spec.get_path("encoding.y.scale.zero"),
            Some(&Json::Bool(true))
        );
        assert_eq!(
            completed.spec.get_path("encoding.y.scale.type"),
            Some(&Json::String("log".into()))
        );
    }

    #[test]
    fn binning_translates_to_maxbins() {
        let a = answer(&["mark(bar)", "channel(e0,x)", "field(e0,expr)", "type(e0,quantitative)", "bin(e0,10)"]);
        let completed = complete_spec(&spec("{}"), &[a], ModelSelection::First);
        assert_eq!(
            completed.spec.get_path("encoding.x.bin.maxbins"),
            Some(&Json::Number(10.into()))
        );
    }

    #[test]
    fn empty_answer_set_is_valid_and_changes_nothing() {
        let partial = spec(r#"{"mark": "point"}"#);
        let completed = complete_spec(&partial, &[answer(&[])], ModelSelection::First);
        assert_eq!(completed.spec, partial);
        assert!(completed.is_complete());
    }
}
