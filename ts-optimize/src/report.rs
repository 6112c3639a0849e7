use crate::{ConvergencePolicy, OptimizeError, OptimizerSettings, Result};
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use log::{info, warn};
use ts_core::nalgebra::Dynamic;

/// How a Levenberg-Marquardt run ended.
#[derive(Debug, Clone, PartialEq)]
pub struct ResectionReport {
    /// The solver's termination reason, as its `Debug` output.
    pub termination: String,
    pub converged: bool,
    /// Number of residual evaluations, numerical differentiation included.
    pub evaluations: usize,
    /// Half the sum of the squared residuals at the returned parameters.
    pub cost: f64,
}

/// Runs Levenberg-Marquardt on `problem` and applies the convergence policy.
pub(crate) fn minimize<P>(problem: P, settings: &OptimizerSettings) -> Result<(P, ResectionReport)>
where
    P: LeastSquaresProblem<f64, Dynamic, Dynamic>,
{
    let (problem, outcome) = LevenbergMarquardt::new()
        .with_ftol(settings.ftol)
        .with_xtol(settings.xtol)
        .with_patience(settings.patience)
        .minimize(problem);
    let report = ResectionReport {
        termination: format!("{:?}", outcome.termination),
        converged: outcome.termination.was_successful(),
        evaluations: outcome.number_of_evaluations,
        cost: outcome.objective_function,
    };

    if report.converged {
        info!(
            "Levenberg-Marquardt terminated with reason {} after {} evaluations, cost {}",
            report.termination, report.evaluations, report.cost
        );
        return Ok((problem, report));
    }

    match settings.convergence {
        ConvergencePolicy::Warn => {
            warn!(
                "Levenberg-Marquardt did not converge: {} after {} evaluations, cost {}",
                report.termination, report.evaluations, report.cost
            );
            Ok((problem, report))
        }
        ConvergencePolicy::Fail => Err(OptimizeError::NotConverged {
            termination: outcome.termination,
            cost: report.cost,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ts_core::nalgebra::{DMatrix, DVector, VecStorage, U1};

    /// A problem whose residuals can never be evaluated.
    struct Broken(DVector<f64>);

    impl LeastSquaresProblem<f64, Dynamic, Dynamic> for Broken {
        type ResidualStorage = VecStorage<f64, Dynamic, U1>;
        type JacobianStorage = VecStorage<f64, Dynamic, Dynamic>;
        type ParameterStorage = VecStorage<f64, Dynamic, U1>;

        fn set_params(&mut self, x: &DVector<f64>) {
            self.0.copy_from(x);
        }

        fn params(&self) -> DVector<f64> {
            self.0.clone()
        }

        fn residuals(&self) -> Option<DVector<f64>> {
            None
        }

        fn jacobian(&self) -> Option<DMatrix<f64>> {
            None
        }
    }

    #[test]
    fn policy_decides_on_failures() {
        let warn = OptimizerSettings::default().convergence(ConvergencePolicy::Warn);
        let (_, report) = minimize(Broken(DVector::zeros(2)), &warn).unwrap();
        assert!(!report.converged);
        assert!(!report.termination.is_empty());
        let copy = report.clone();
        assert_eq!(copy, report);

        let fail = OptimizerSettings::default().convergence(ConvergencePolicy::Fail);
        assert!(matches!(
            minimize(Broken(DVector::zeros(2)), &fail),
            Err(OptimizeError::NotConverged { .. })
        ));
    }
}
