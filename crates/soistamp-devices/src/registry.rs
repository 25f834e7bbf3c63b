//! Model/instance registry and the per-instance pass loop.
//!
//! Every pass visits models in insertion order and, within a model,
//! instances in insertion order. A fatal error aborts the pass at once;
//! any other error is logged against its instance and the pass continues.

use soistamp_core::{MatrixSink, MatrixStructure};

use crate::analysis::Analysis;
use crate::error::{Error, Result};
use crate::options::Tolerances;
use crate::soi::convergence::{ConvergenceReport, ConvergenceState};
use crate::soi::instance::Instance;
use crate::soi::model::{Model, ModelRef};
use crate::soi::truncation::{TimestepReport, TruncationEstimator};

/// Outcome of a pass that completed without a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassSummary {
    pub visited: usize,
    /// Instances whose callback returned a non-fatal error.
    pub failed: usize,
}

/// All models of the SOI family in a circuit.
#[derive(Debug, Default)]
pub struct Registry {
    models: Vec<Model>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model. Names are unique.
    pub fn add_model(&mut self, model: Model) -> Result<&mut Model> {
        if self.models.iter().any(|m| m.name() == model.name()) {
            return Err(Error::DuplicateModel(model.name().to_string()));
        }
        self.models.push(model);
        let last = self.models.len() - 1;
        Ok(&mut self.models[last])
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn models_mut(&mut self) -> &mut [Model] {
        &mut self.models
    }

    pub fn model(&self, name: &str) -> Result<&Model> {
        self.models
            .iter()
            .find(|m| m.name() == name)
            .ok_or_else(|| Error::UnknownModel(name.to_string()))
    }

    pub fn model_mut(&mut self, name: &str) -> Result<&mut Model> {
        self.models
            .iter_mut()
            .find(|m| m.name() == name)
            .ok_or_else(|| Error::UnknownModel(name.to_string()))
    }

    pub fn num_instances(&self) -> usize {
        self.models.iter().map(|m| m.instances().len()).sum()
    }

    pub fn find_instance(&self, name: &str) -> Result<&Instance> {
        self.models
            .iter()
            .find_map(|m| m.instance(name))
            .ok_or_else(|| Error::UnknownInstance(name.to_string()))
    }

    pub fn find_instance_mut(&mut self, name: &str) -> Result<&mut Instance> {
        self.models
            .iter_mut()
            .find_map(|m| m.instance_mut(name))
            .ok_or_else(|| Error::UnknownInstance(name.to_string()))
    }

    /// Visit every instance once, model-then-instance order.
    pub fn for_each_instance<F>(&self, mut f: F) -> Result<PassSummary>
    where
        F: FnMut(ModelRef<'_>, &Instance) -> Result<()>,
    {
        let mut summary = PassSummary::default();
        for model in &self.models {
            let shared = model.shared();
            for inst in model.instances() {
                summary.visited += 1;
                record(&mut summary, inst.name(), f(shared, inst))?;
            }
        }
        Ok(summary)
    }

    /// Mutable counterpart of [`Registry::for_each_instance`].
    pub fn for_each_instance_mut<F>(&mut self, mut f: F) -> Result<PassSummary>
    where
        F: FnMut(ModelRef<'_>, &mut Instance) -> Result<()>,
    {
        let mut summary = PassSummary::default();
        for model in &mut self.models {
            let (shared, instances) = model.split_mut();
            for inst in instances {
                summary.visited += 1;
                let outcome = f(shared, inst);
                record(&mut summary, inst.name(), outcome)?;
            }
        }
        Ok(summary)
    }

    /// Acquire matrix handles for every instance.
    pub fn setup(&mut self, structure: &mut dyn MatrixStructure) {
        for model in &mut self.models {
            for inst in model.instances_mut() {
                inst.setup(structure);
            }
        }
    }

    /// Stamp (or, for noise, evaluate) every instance.
    pub fn load(&mut self, analysis: &Analysis<'_>, sink: &mut dyn MatrixSink) -> Result<PassSummary> {
        self.for_each_instance_mut(|model, inst| inst.load(&model, analysis, sink))
    }

    /// Move every model to a new ambient temperature (K).
    pub fn set_temperature(&mut self, temp: f64) -> Result<()> {
        for model in &mut self.models {
            model.set_temperature(temp)?;
        }
        Ok(())
    }

    /// Check every instance, stopping at the first one that has not
    /// converged. An instance with no previous iteration has not converged.
    pub fn check_convergence(&self, tol: &Tolerances) -> ConvergenceReport {
        for model in &self.models {
            for inst in model.instances() {
                if inst.convergence(tol) != ConvergenceState::Converged {
                    return ConvergenceReport {
                        converged: false,
                        noncon: 1,
                    };
                }
            }
        }
        ConvergenceReport {
            converged: true,
            noncon: 0,
        }
    }

    /// Smallest step any tracked charge of any instance allows.
    pub fn truncation_step(&self, estimator: &dyn TruncationEstimator, step: f64) -> TimestepReport {
        let mut report = TimestepReport::default();
        for model in &self.models {
            for inst in model.instances() {
                if let Some((h, kind)) = inst.truncation_step(estimator, step) {
                    report.offer(h, inst.name(), kind);
                }
            }
        }
        if let Some(limit) = &report.limited_by {
            log::trace!(
                "step {:e} bounded by {} ({:?} charge)",
                report.suggested_step,
                limit.instance,
                limit.kind
            );
        }
        report
    }

    /// Record the present operating points as an accepted time point.
    pub fn accept_step(&mut self, step: f64) {
        for model in &mut self.models {
            for inst in model.instances_mut() {
                inst.accept_step(step);
            }
        }
    }

    pub fn reset_noise(&mut self) {
        for model in &mut self.models {
            for inst in model.instances_mut() {
                inst.reset_noise();
            }
        }
    }
}

fn record(summary: &mut PassSummary, instance: &str, outcome: Result<()>) -> Result<()> {
    match outcome {
        Ok(()) => Ok(()),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            log::warn!("{instance}: {e}");
            summary.failed += 1;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soi::params::{InstanceParams, ModelParams};
    use crate::soi::size::GeometryFault;
    use crate::soi::synthetic;
    use crate::soi::topology::ExternalNodes;
    use crate::soi::truncation::{ChargeKind, TruncationSample};
    use soistamp_core::{NodeId, NodeTable, SparseMatrix};

    fn registry() -> (Registry, NodeTable) {
        let mut table = NodeTable::new();
        let mut reg = Registry::new();
        for (model_name, params) in [
            ("nch", ModelParams::nmos_default()),
            ("pch", ModelParams::pmos_default()),
        ] {
            let model = reg.add_model(Model::new(model_name, params).unwrap()).unwrap();
            for i in 0..2 {
                let prefix = format!("{model_name}{i}");
                let d = table.add_external(format!("{prefix}d")).unwrap();
                let g = table.add_external(format!("{prefix}g")).unwrap();
                let s = table.add_external(format!("{prefix}s")).unwrap();
                let nodes = ExternalNodes::new(d, g, s, NodeId::GROUND);
                model
                    .add_instance(format!("M{prefix}"), nodes, InstanceParams::default(), &mut table)
                    .unwrap();
            }
        }
        (reg, table)
    }

    #[test]
    fn test_visit_order_is_stable() {
        let (reg, _) = registry();
        let mut seen = Vec::new();
        let summary = reg
            .for_each_instance(|model, inst| {
                seen.push(format!("{}/{}", model.name, inst.name()));
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, ["nch/Mnch0", "nch/Mnch1", "pch/Mpch0", "pch/Mpch1"]);
        assert_eq!(summary, PassSummary { visited: 4, failed: 0 });
    }

    #[test]
    fn test_soft_failure_does_not_stop_pass() {
        let (mut reg, _) = registry();
        let mut visited = 0;
        let summary = reg
            .for_each_instance_mut(|_, inst| {
                visited += 1;
                if inst.name() == "Mnch1" {
                    Err(Error::NotSetUp(inst.name().to_string()))
                } else {
                    Ok(())
                }
            })
            .unwrap();
        assert_eq!(visited, 4);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn test_fatal_failure_aborts_pass() {
        let (mut reg, _) = registry();
        let mut visited = 0;
        let err = reg
            .for_each_instance_mut(|model, inst| {
                visited += 1;
                Err(Error::FatalGeometry {
                    model: model.name.to_string(),
                    instance: inst.name().to_string(),
                    fault: GeometryFault::EffectiveWidth { value: -1e-9 },
                })
            })
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(visited, 1);
    }

    #[test]
    fn test_lookup() {
        let (mut reg, _) = registry();
        assert_eq!(reg.num_instances(), 4);
        assert!(reg.find_instance("Mpch1").is_ok());
        assert!(matches!(reg.find_instance("M9"), Err(Error::UnknownInstance(_))));
        assert!(matches!(reg.model("bsim"), Err(Error::UnknownModel(_))));
        assert!(reg.find_instance_mut("Mnch0").is_ok());
        let dup = Model::new("nch", ModelParams::nmos_default()).unwrap();
        assert!(matches!(reg.add_model(dup), Err(Error::DuplicateModel(_))));
    }

    #[test]
    fn test_load_before_setup_is_soft() {
        let (mut reg, _) = registry();
        let mut m = SparseMatrix::new();
        let summary = reg
            .load(&Analysis::DcOrTransient { ag0: 0.0 }, &mut m)
            .unwrap();
        assert_eq!(summary, PassSummary { visited: 4, failed: 4 });

        reg.setup(&mut m);
        let summary = reg
            .load(&Analysis::DcOrTransient { ag0: 0.0 }, &mut m)
            .unwrap();
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn test_convergence_needs_prior() {
        let (mut reg, _) = registry();
        let tol = Tolerances::default();
        assert!(!reg.check_convergence(&tol).converged);

        // Same point twice: the prediction equals the evaluation exactly.
        let op = synthetic::operating_point(3);
        reg.for_each_instance_mut(|_, inst| {
            inst.update_operating_point(op);
            inst.update_operating_point(op);
            Ok(())
        })
        .unwrap();
        let report = reg.check_convergence(&tol);
        assert!(report.converged);
        assert_eq!(report.noncon, 0);
    }

    #[test]
    fn test_convergence_short_circuits() {
        let (mut reg, _) = registry();
        let a = synthetic::operating_point(3);
        let mut b = a;
        b.ids += 1.0;
        reg.for_each_instance_mut(|_, inst| {
            inst.update_operating_point(a);
            inst.update_operating_point(b);
            Ok(())
        })
        .unwrap();
        let report = reg.check_convergence(&Tolerances::default());
        assert!(!report.converged);
        assert_eq!(report.noncon, 1);
    }

    #[test]
    fn test_smallest_step_wins() {
        let (mut reg, _) = registry();
        reg.for_each_instance_mut(|_, inst| {
            inst.update_operating_point(synthetic::operating_point(5));
            Ok(())
        })
        .unwrap();
        reg.accept_step(1e-9);

        let estimator = |s: &TruncationSample<'_>| match s.kind {
            ChargeKind::Drain => 2e-10,
            _ => 1e-9,
        };
        let report = reg.truncation_step(&estimator, 1e-9);
        assert_eq!(report.suggested_step, 2e-10);
        let limit = report.limited_by.clone().unwrap();
        assert_eq!(limit.instance, "Mnch0");
        assert_eq!(limit.kind, ChargeKind::Drain);
        assert!(report.rejects(1e-9));
    }

    #[test]
    fn test_unbounded_estimator_leaves_step_open() {
        let (reg, _) = registry();
        let report = reg.truncation_step(&|_: &TruncationSample<'_>| f64::INFINITY, 1e-9);
        assert_eq!(report.suggested_step, f64::INFINITY);
        assert!(report.limited_by.is_none());
        assert!(!report.rejects(1e-9));
    }

    #[test]
    fn test_temperature_reaches_every_model() {
        let (mut reg, _) = registry();
        reg.set_temperature(350.0).unwrap();
        assert!(reg.models().iter().all(|m| m.temp().temp == 350.0));
    }
}
