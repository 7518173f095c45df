pub mod assets;
pub mod candidate;
pub mod comparison;
pub mod criteria;
pub mod part;
pub mod scoring;
pub mod time_serde;
pub mod units;

mod error;

pub use assets::{AssetBundle, AssetManifest, FetchOutcome, ValidationOutcome, Verdict, validate};
pub use candidate::{CandidateRecord, CatalogPage, Page, RankingAttributes};
pub use comparison::{AttributeCell, PartComparison};
pub use criteria::{AttributeRange, FilterCriteria, Preference};
pub use error::Error;
pub use part::{AttributeValue, AvailabilityTier, PartRecord, PriceTier};
pub use scoring::RankingWeights;

pub type Result<T, E = Error> = std::result::Result<T, E>;
