//! # Portfolio
//!
//! $$
//! \mu_p = 252\,\bar r^\top\mathbf w,\qquad \sigma_p = \sqrt{252\,\mathbf w^\top\Sigma\,\mathbf w}
//! $$
//!
pub mod analyzer;
pub mod data;
pub mod engine;
pub mod frontier;
pub mod optimizers;
pub mod report;
pub mod source;
pub mod sqp;
pub mod synthetic;
pub mod types;

pub use analyzer::BetaEstimate;
pub use analyzer::PerformanceAnalyzer;
pub use data::AssetMoments;
pub use data::CumulativeReturnSeries;
pub use data::PriceTable;
pub use data::ReturnSeries;
pub use engine::AnalysisReport;
pub use engine::PortfolioEngine;
pub use engine::PortfolioEngineConfig;
pub use frontier::FrontierSample;
pub use frontier::FrontierSampler;
pub use optimizers::PortfolioOptimizer;
pub use source::load_or_fetch;
pub use source::MemoryStore;
pub use source::PriceProvider;
pub use source::PriceRequest;
pub use source::PriceStore;
pub use types::Allocation;
pub use types::Objective;
pub use types::PerformanceResult;
pub use types::WeightVector;
