pub mod forecast;
pub mod recommend;

pub use forecast::{BudgetRunway, Forecast, SeasonalAnalysis, Trend, budget_runway, forecast_costs, seasonal_analysis};
pub use recommend::{AnalysisSummary, IdleResource, NamespaceAnalysis, Recommendation, Recommender};
