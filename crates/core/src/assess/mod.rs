pub mod align;
pub mod drill;
pub mod engine;
pub mod report;
pub mod score;

pub use align::{align, AlignmentOp, AlignmentResult, CostModel, SubstitutionKind};
pub use drill::{select_drills, DrillConfig};
pub use engine::{AssessmentRequest, Assessor, CancellationToken};
pub use report::PronunciationReport;
pub use score::{score, ScoreSummary};
