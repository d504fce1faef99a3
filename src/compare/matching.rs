use std::collections::HashMap;
use std::hash::Hash;

use crate::cancel::CancelToken;
use crate::error::Error;
use crate::model::{StyleRecord, StyleSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchStrategy {
    ContextKey,
    Signature,
    NameAndType,
    Structural,
}

/// Outcome of pairing template records with document records. All values
/// are indices into the respective `StyleSet::records`.
#[derive(Debug, Default)]
pub(crate) struct Matching {
    pub(crate) pairs: Vec<(usize, usize, MatchStrategy)>,
    pub(crate) missing: Vec<usize>,
    pub(crate) unmatched: Vec<usize>,
}

fn index_by<'a, K: Eq + Hash>(
    records: &'a [StyleRecord],
    ids: &[usize],
    key: impl Fn(&'a StyleRecord) -> K,
) -> HashMap<K, Vec<usize>> {
    let mut index: HashMap<K, Vec<usize>> = HashMap::new();
    for &i in ids {
        index.entry(key(&records[i])).or_default().push(i);
    }
    index
}

/// First unclaimed candidate in traversal order.
fn claim(candidates: Option<&Vec<usize>>, claimed: &mut [bool]) -> Option<usize> {
    let found = candidates?.iter().copied().find(|&i| !claimed[i])?;
    claimed[found] = true;
    Some(found)
}

fn same_position(t: &StyleRecord, d: &StyleRecord, slack: usize) -> Option<usize> {
    let (tc, dc) = (&t.context, &d.context);
    if tc.structural_role != dc.structural_role
        || t.style_type != d.style_type
        || tc.section_index != dc.section_index
        || tc.table_index != dc.table_index
        || tc.row_index != dc.row_index
        || tc.cell_index != dc.cell_index
        || tc.header_footer_kind != dc.header_footer_kind
    {
        return None;
    }
    match (tc.paragraph_index, dc.paragraph_index) {
        (Some(a), Some(b)) if a.abs_diff(b) <= slack => Some(a.abs_diff(b)),
        (None, None) => Some(0),
        _ => None,
    }
}

/// Pairs every template record with at most one document record. Each
/// strategy runs over all still-unmatched template records before the next
/// one is tried; ties go to the document record seen first.
pub(crate) fn match_styles(
    template: &StyleSet,
    document: &StyleSet,
    template_ids: &[usize],
    document_ids: &[usize],
    slack: usize,
    cancel: &CancelToken,
) -> Result<Matching, Error> {
    let mut claimed = vec![false; document.records.len()];
    let mut matched: Vec<Option<(usize, MatchStrategy)>> = vec![None; template_ids.len()];

    let docs = &document.records;
    let by_key = index_by(docs, document_ids, |r| r.context.context_key.as_str());
    let by_signature = index_by(docs, document_ids, |r| &r.signature);
    let by_name = index_by(docs, document_ids, |r| (r.name.as_str(), r.style_type));

    let strategies = [
        MatchStrategy::ContextKey,
        MatchStrategy::Signature,
        MatchStrategy::NameAndType,
        MatchStrategy::Structural,
    ];
    for strategy in strategies {
        for (slot, &ti) in matched.iter_mut().zip(template_ids) {
            if slot.is_some() {
                continue;
            }
            cancel.check()?;
            let t = &template.records[ti];
            let found = match strategy {
                MatchStrategy::ContextKey => {
                    claim(by_key.get(t.context.context_key.as_str()), &mut claimed)
                }
                MatchStrategy::Signature => claim(by_signature.get(&t.signature), &mut claimed),
                MatchStrategy::NameAndType => {
                    claim(by_name.get(&(t.name.as_str(), t.style_type)), &mut claimed)
                }
                MatchStrategy::Structural => {
                    let best = document_ids
                        .iter()
                        .copied()
                        .filter(|&di| !claimed[di])
                        .filter_map(|di| same_position(t, &docs[di], slack).map(|d| (d, di)))
                        .min_by_key(|&(distance, di)| (distance, di))
                        .map(|(_, di)| di);
                    if let Some(di) = best {
                        claimed[di] = true;
                    }
                    best
                }
            };
            if let Some(di) = found {
                log::debug!(
                    "Matched template {} '{}' to document {} by {:?}",
                    t.context.context_key,
                    t.name,
                    docs[di].context.context_key,
                    strategy
                );
                *slot = Some((di, strategy));
            }
        }
    }

    let mut result = Matching::default();
    for (slot, &ti) in matched.iter().zip(template_ids) {
        match slot {
            Some((di, strategy)) => result.pairs.push((ti, *di, *strategy)),
            None => result.missing.push(ti),
        }
    }
    result.unmatched = document_ids
        .iter()
        .copied()
        .filter(|&di| !claimed[di])
        .collect();
    Ok(result)
}
