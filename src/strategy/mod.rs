pub mod mcda;
pub mod oracle;
pub mod solver;

pub use mcda::{DecisionEngine, EvaluatedStrategy, PlanBuilder, PlanStatus, Scenario};
pub use oracle::{reference_plans, NamedPlan, SimulationSummary, StintPlan, StrategyOracle};
pub use solver::ExhaustiveSolver;
