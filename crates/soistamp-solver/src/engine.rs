//! Pass driver over a [`Registry`].
//!
//! The stamp kernel of every instance is pure, so the parallel path
//! evaluates kernels on the rayon pool and then applies the results to the
//! sink one instance at a time, in registry order. Shared matrix entries
//! therefore receive their contributions in the same order as the
//! sequential path and the two produce identical matrices.

use rayon::prelude::*;
use soistamp_core::{MatrixSink, MatrixStructure};
use soistamp_devices::soi::{ChargeKind, Instance, StampSet};
use soistamp_devices::{
    Analysis, ConvergenceReport, PassSummary, Registry, TimestepReport, Tolerances,
    TruncationEstimator,
};

use crate::config::EngineConfig;
use crate::error::Result;

/// Runs analysis passes over every instance of a registry.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
    tolerances: Tolerances,
}

impl Engine {
    pub fn new(config: EngineConfig, tolerances: Tolerances) -> Self {
        Self { config, tolerances }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tolerances(&self) -> &Tolerances {
        &self.tolerances
    }

    fn use_parallel(&self, registry: &Registry) -> bool {
        self.config.parallel
            && registry.num_instances() >= self.config.min_parallel
            && rayon::current_num_threads() > 1
    }

    /// Acquire matrix handles for every instance.
    pub fn setup(&self, registry: &mut Registry, structure: &mut dyn MatrixStructure) {
        registry.setup(structure);
    }

    /// Stamp every instance for `analysis`.
    ///
    /// Noise passes write no matrix entries and always run sequentially.
    pub fn load(
        &self,
        registry: &mut Registry,
        analysis: &Analysis<'_>,
        sink: &mut dyn MatrixSink,
    ) -> Result<PassSummary> {
        let parallel = self.use_parallel(registry) && !matches!(analysis, Analysis::Noise { .. });
        if !parallel {
            return Ok(registry.load(analysis, sink)?);
        }

        let sets: Vec<StampSet> = instances(registry)
            .par_iter()
            .map(|inst| inst.stamp_set())
            .collect();
        let mut sets = sets.into_iter();
        let summary = registry.for_each_instance_mut(|_, inst| match sets.next() {
            Some(set) => inst.apply(&set, analysis, sink),
            None => Ok(()),
        })?;
        Ok(summary)
    }

    /// Newton convergence over every instance.
    pub fn check_convergence(&self, registry: &Registry) -> ConvergenceReport {
        registry.check_convergence(&self.tolerances)
    }

    /// Smallest step every tracked charge allows after a trial step of `step`.
    pub fn truncation_step(
        &self,
        registry: &Registry,
        estimator: &dyn TruncationEstimator,
        step: f64,
    ) -> TimestepReport {
        if !self.use_parallel(registry) {
            return registry.truncation_step(estimator, step);
        }

        let all = instances(registry);
        let bounds: Vec<Option<(f64, ChargeKind)>> = all
            .par_iter()
            .map(|inst| inst.truncation_step(estimator, step))
            .collect();
        let mut report = TimestepReport::default();
        for (inst, bound) in all.iter().zip(bounds) {
            if let Some((h, kind)) = bound {
                report.offer(h, inst.name(), kind);
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

    /// Accept the present operating points as a time point.
    pub fn accept_step(&self, registry: &mut Registry, step: f64) {
        registry.accept_step(step);
    }
}

fn instances(registry: &Registry) -> Vec<&Instance> {
    registry
        .models()
        .iter()
        .flat_map(|m| m.instances())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use soistamp_core::{NodeId, NodeTable, SparseMatrix};
    use soistamp_devices::soi::synthetic;
    use soistamp_devices::soi::TruncationSample;
    use soistamp_devices::{ExternalNodes, InstanceParams, Model, ModelParams};

    /// A chain of devices sharing drain/source nodes with a common gate.
    fn chain(n: usize) -> Registry {
        let mut table = NodeTable::new();
        let mut reg = Registry::new();
        let mut params = ModelParams::nmos_default();
        params.rds_mod = true;
        let model = reg.add_model(Model::new("nch", params).unwrap()).unwrap();
        let gate = table.add_external("g").unwrap();
        let mut prev = table.add_external("n0").unwrap();
        for i in 0..n {
            let next = table.add_external(format!("n{}", i + 1)).unwrap();
            let nodes = ExternalNodes::new(next, gate, prev, NodeId::GROUND);
            let inst = model
                .add_instance(format!("M{i}"), nodes, InstanceParams::default(), &mut table)
                .unwrap();
            inst.update_operating_point(synthetic::operating_point(i as u64));
            prev = next;
        }
        reg
    }

    fn stamp(engine: &Engine, analysis: Analysis<'_>) -> SparseMatrix {
        let mut reg = chain(16);
        let mut m = SparseMatrix::new();
        engine.setup(&mut reg, &mut m);
        engine.load(&mut reg, &analysis, &mut m).unwrap();
        m
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let seq = Engine::new(EngineConfig::sequential(), Tolerances::default());
        let par = Engine::new(EngineConfig::default().with_min_parallel(1), Tolerances::default());
        for analysis in [
            Analysis::DcOrTransient { ag0: 0.0 },
            Analysis::DcOrTransient { ag0: 2e9 },
            Analysis::Ac { omega: 1e7 },
        ] {
            let a = stamp(&seq, analysis);
            let b = stamp(&par, analysis);
            assert_eq!(a.nnz(), b.nnz());
            for ((ra, ca, va), (rb, cb, vb)) in a.iter().zip(b.iter()) {
                assert_eq!((ra, ca), (rb, cb));
                assert_eq!(va, vb);
            }
            for i in 1..=a.dimension() as u32 {
                assert_eq!(a.rhs(NodeId::new(i)), b.rhs(NodeId::new(i)));
            }
        }
    }

    #[test]
    fn test_parallel_truncation_matches_sequential() {
        let mut reg = chain(16);
        reg.accept_step(1e-9);
        let estimator = |s: &TruncationSample<'_>| 1e-9 / (1.0 + s.present.charge.abs() * 1e15);

        let seq = Engine::new(EngineConfig::sequential(), Tolerances::default());
        let par = Engine::new(EngineConfig::default().with_min_parallel(1), Tolerances::default());
        assert_eq!(
            seq.truncation_step(&reg, &estimator, 1e-9),
            par.truncation_step(&reg, &estimator, 1e-9)
        );
    }
}
