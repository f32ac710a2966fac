//! Weighted edit-distance alignment of reference vs. recognized phonemes.
//!
//! Levenshtein-style DP over phoneme tokens. Each cell of the row-major
//! arena holds the cost of aligning the remaining suffixes, so the edit
//! script is read forward from (0, 0).
//!
//! Equal-cost paths are resolved by:
//! 1. fewer gap operations (insertions + deletions) on the path,
//! 2. step kind at the earliest differing position: diagonal, then
//!    deletion, then insertion.
//!
//! A substitution therefore comes before any insertion it ties with, and
//! the extra sounds stay with the word that produced them.

use serde::{Deserialize, Serialize};

use crate::error::AssessError;
use crate::language::phoneme_table::PhonemeClass;
use crate::types::{word_key, ErrorKind, Phoneme, PhonemeSequence};

/// Costs closer than this are treated as equal.
const COST_EPSILON: f64 = 1e-9;

/// Substitution / gap costs. Match is always 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModel {
    /// Different symbol, same phoneme class
    pub same_class_substitution: f64,
    /// Different phoneme classes (vowel vs. consonant)
    pub cross_class_substitution: f64,
    /// Same phoneme, different stress level
    pub stress_substitution: f64,
    pub insertion: f64,
    pub deletion: f64,
    /// Ignore stress differences entirely
    pub lenient_stress: bool,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            same_class_substitution: 0.5,
            cross_class_substitution: 1.0,
            stress_substitution: 0.5,
            insertion: 1.0,
            deletion: 1.0,
            lenient_stress: false,
        }
    }
}

impl CostModel {
    pub fn validate(&self) -> Result<(), AssessError> {
        let costs = [
            ("same_class_substitution", self.same_class_substitution),
            ("cross_class_substitution", self.cross_class_substitution),
            ("stress_substitution", self.stress_substitution),
            ("insertion", self.insertion),
            ("deletion", self.deletion),
        ];
        for (name, value) in costs {
            if !value.is_finite() || value < 0.0 {
                return Err(AssessError::invalid_config(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstitutionKind {
    WrongVowel,
    WrongConsonant,
    StressShift,
}

impl From<SubstitutionKind> for ErrorKind {
    fn from(kind: SubstitutionKind) -> Self {
        match kind {
            SubstitutionKind::WrongVowel => ErrorKind::WrongVowel,
            SubstitutionKind::WrongConsonant => ErrorKind::WrongConsonant,
            SubstitutionKind::StressShift => ErrorKind::StressShift,
        }
    }
}

/// One step of the edit script. Indices point into the reference and
/// recognized phoneme sequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AlignmentOp {
    Match {
        reference: usize,
        recognized: usize,
    },
    Substitution {
        reference: usize,
        recognized: usize,
        kind: SubstitutionKind,
        cost: f64,
    },
    /// Recognized phoneme with no reference counterpart
    Insertion { recognized: usize, cost: f64 },
    /// Reference phoneme that was not pronounced
    Deletion { reference: usize, cost: f64 },
}

impl AlignmentOp {
    pub fn reference_index(&self) -> Option<usize> {
        match self {
            AlignmentOp::Match { reference, .. }
            | AlignmentOp::Substitution { reference, .. }
            | AlignmentOp::Deletion { reference, .. } => Some(*reference),
            AlignmentOp::Insertion { .. } => None,
        }
    }

    pub fn recognized_index(&self) -> Option<usize> {
        match self {
            AlignmentOp::Match { recognized, .. }
            | AlignmentOp::Substitution { recognized, .. }
            | AlignmentOp::Insertion { recognized, .. } => Some(*recognized),
            AlignmentOp::Deletion { .. } => None,
        }
    }

    pub fn cost(&self) -> f64 {
        match self {
            AlignmentOp::Match { .. } => 0.0,
            AlignmentOp::Substitution { cost, .. }
            | AlignmentOp::Insertion { cost, .. }
            | AlignmentOp::Deletion { cost, .. } => *cost,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, AlignmentOp::Match { .. })
    }

    /// Error category of this op, `None` for a match.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            AlignmentOp::Match { .. } => None,
            AlignmentOp::Substitution { kind, .. } => Some((*kind).into()),
            AlignmentOp::Insertion { .. } => Some(ErrorKind::Insertion),
            AlignmentOp::Deletion { .. } => Some(ErrorKind::Omission),
        }
    }
}

/// Per-type op counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpCounts {
    pub matches: usize,
    pub substitutions: usize,
    pub insertions: usize,
    pub deletions: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    pub ops: Vec<AlignmentOp>,
    pub total_cost: f64,
}

impl AlignmentResult {
    /// True when `ops` consumes `0..m` reference and `0..n` recognized
    /// phonemes left-to-right exactly once and `total_cost` is their sum.
    pub fn is_valid_for(&self, m: usize, n: usize) -> bool {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        for op in &self.ops {
            if let Some(r) = op.reference_index() {
                if r != i {
                    return false;
                }
                i += 1;
            }
            if let Some(h) = op.recognized_index() {
                if h != j {
                    return false;
                }
                j += 1;
            }
            sum += op.cost();
        }
        i == m && j == n && (sum - self.total_cost).abs() < 1e-6
    }

    pub fn counts(&self) -> OpCounts {
        let mut counts = OpCounts::default();
        for op in &self.ops {
            match op {
                AlignmentOp::Match { .. } => counts.matches += 1,
                AlignmentOp::Substitution { .. } => counts.substitutions += 1,
                AlignmentOp::Insertion { .. } => counts.insertions += 1,
                AlignmentOp::Deletion { .. } => counts.deletions += 1,
            }
        }
        counts
    }

    pub fn error_count(&self) -> usize {
        self.ops.iter().filter(|op| !op.is_match()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    End,
    Diagonal,
    Deletion,
    Insertion,
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    cost: f64,
    /// Insertions + deletions on the best path from this cell to the end
    gaps: u32,
    step: Step,
}

impl Cell {
    /// Strictly better under the tie-break order. Candidates are offered in
    /// step-preference order, so an exact tie keeps the earlier one.
    fn beats(&self, other: &Cell) -> bool {
        if self.cost < other.cost - COST_EPSILON {
            return true;
        }
        if self.cost > other.cost + COST_EPSILON {
            return false;
        }
        self.gaps < other.gaps
    }
}

/// Number of DP cells needed to align sequences of length `m` and `n`.
pub fn alignment_cells(m: usize, n: usize) -> usize {
    m.saturating_add(1).saturating_mul(n.saturating_add(1))
}

/// [`align`] with a guard on matrix size, checked before allocating.
pub fn try_align(
    reference: &PhonemeSequence,
    recognized: &PhonemeSequence,
    costs: &CostModel,
    max_cells: usize,
) -> Result<AlignmentResult, AssessError> {
    let cells = alignment_cells(reference.len(), recognized.len());
    if cells > max_cells {
        return Err(AssessError::InputTooLarge {
            cells,
            limit: max_cells,
        });
    }
    Ok(align(reference, recognized, costs))
}

/// Minimum-cost edit script turning `reference` into `recognized`.
pub fn align(reference: &PhonemeSequence, recognized: &PhonemeSequence, costs: &CostModel) -> AlignmentResult {
    let ref_keys = comparison_keys(reference);
    let rec_keys = comparison_keys(recognized);
    let ref_ph = reference.phonemes();
    let rec_ph = recognized.phonemes();
    let m = ref_ph.len();
    let n = rec_ph.len();
    let width = n + 1;

    let compare = |i: usize, j: usize| -> Option<(SubstitutionKind, f64)> {
        substitution(&ref_ph[i], &ref_keys[i], &rec_ph[j], &rec_keys[j], costs)
    };

    // --- DP fill, cost-to-go from (i, j) to (m, n) ---
    let mut grid = vec![
        Cell {
            cost: 0.0,
            gaps: 0,
            step: Step::End,
        };
        (m + 1) * width
    ];

    for i in (0..=m).rev() {
        for j in (0..=n).rev() {
            if i == m && j == n {
                continue;
            }
            let mut best: Option<Cell> = None;
            if i < m && j < n {
                let next = grid[(i + 1) * width + (j + 1)];
                let sub_cost = compare(i, j).map_or(0.0, |(_, c)| c);
                offer(
                    &mut best,
                    Cell {
                        cost: next.cost + sub_cost,
                        gaps: next.gaps,
                        step: Step::Diagonal,
                    },
                );
            }
            if i < m {
                let next = grid[(i + 1) * width + j];
                offer(
                    &mut best,
                    Cell {
                        cost: next.cost + costs.deletion,
                        gaps: next.gaps + 1,
                        step: Step::Deletion,
                    },
                );
            }
            if j < n {
                let next = grid[i * width + (j + 1)];
                offer(
                    &mut best,
                    Cell {
                        cost: next.cost + costs.insertion,
                        gaps: next.gaps + 1,
                        step: Step::Insertion,
                    },
                );
            }
            if let Some(cell) = best {
                grid[i * width + j] = cell;
            }
        }
    }

    // --- Forward trace ---
    let mut ops = Vec::with_capacity(m.max(n));
    let (mut i, mut j) = (0, 0);
    loop {
        match grid[i * width + j].step {
            Step::Diagonal => {
                ops.push(match compare(i, j) {
                    None => AlignmentOp::Match {
                        reference: i,
                        recognized: j,
                    },
                    Some((kind, cost)) => AlignmentOp::Substitution {
                        reference: i,
                        recognized: j,
                        kind,
                        cost,
                    },
                });
                i += 1;
                j += 1;
            }
            Step::Deletion => {
                ops.push(AlignmentOp::Deletion {
                    reference: i,
                    cost: costs.deletion,
                });
                i += 1;
            }
            Step::Insertion => {
                ops.push(AlignmentOp::Insertion {
                    recognized: j,
                    cost: costs.insertion,
                });
                j += 1;
            }
            // Only (m, n) is an end cell
            Step::End => break,
        }
    }

    let total_cost = grid[0].cost;
    log::debug!(
        "Aligned {} reference vs {} recognized phonemes: cost {:.3}, {} ops",
        m,
        n,
        total_cost,
        ops.len()
    );

    AlignmentResult { ops, total_cost }
}

/// Keep `candidate` unless an earlier offer is at least as good.
fn offer(best: &mut Option<Cell>, candidate: Cell) {
    if best.map_or(true, |b| candidate.beats(&b)) {
        *best = Some(candidate);
    }
}

/// Per-phoneme comparison keys. Placeholder phonemes are keyed by their
/// word so the same unknown word on both sides still matches.
fn comparison_keys(seq: &PhonemeSequence) -> Vec<String> {
    let mut keys: Vec<String> = seq.phonemes().iter().map(Phoneme::canonical).collect();
    for word in seq.words() {
        for idx in word.range() {
            if seq.phonemes()[idx].is_unknown() {
                keys[idx] = format!("?{}", word_key(&word.text));
            }
        }
    }
    keys
}

/// `None` when the phonemes match; otherwise the substitution kind and cost.
fn substitution(
    reference: &Phoneme,
    ref_key: &str,
    recognized: &Phoneme,
    rec_key: &str,
    costs: &CostModel,
) -> Option<(SubstitutionKind, f64)> {
    if ref_key == rec_key {
        return match (reference.stress, recognized.stress) {
            (Some(a), Some(b)) if a != b && !costs.lenient_stress => {
                Some((SubstitutionKind::StressShift, costs.stress_substitution))
            }
            _ => None,
        };
    }

    let ref_class = reference.class();
    let rec_class = recognized.class();
    let same_class = ref_class == rec_class && ref_class != PhonemeClass::Unknown;
    let cost = if same_class {
        costs.same_class_substitution
    } else {
        costs.cross_class_substitution
    };

    // Classified by the reference phoneme; a placeholder reference takes
    // the recognized class instead.
    let class = match ref_class {
        PhonemeClass::Unknown => rec_class,
        c => c,
    };
    let kind = match class {
        PhonemeClass::Vowel => SubstitutionKind::WrongVowel,
        _ => SubstitutionKind::WrongConsonant,
    };
    Some((kind, cost))
}
