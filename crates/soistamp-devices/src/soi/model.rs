//! A model card and the instances that use it.

use soistamp_core::NodeAllocator;

use super::instance::Instance;
use super::params::{InstanceParams, ModelParams};
use super::size::SizeCache;
use super::temp::ModelTemp;
use super::topology::ExternalNodes;
use crate::error::{Error, Result};

/// Read-only model data handed to instance operations.
#[derive(Debug, Clone, Copy)]
pub struct ModelRef<'a> {
    pub name: &'a str,
    pub params: &'a ModelParams,
    pub temp: &'a ModelTemp,
}

/// One SOI MOSFET model with its size cache and instances.
#[derive(Debug)]
pub struct Model {
    name: String,
    params: ModelParams,
    temp: ModelTemp,
    cache: SizeCache,
    instances: Vec<Instance>,
}

impl Model {
    /// Create a model at its nominal temperature.
    pub fn new(name: impl Into<String>, params: ModelParams) -> Result<Self> {
        params.validate()?;
        let temp = ModelTemp::new(params.tnom, params.tnom);
        Ok(Self {
            name: name.into(),
            params,
            temp,
            cache: SizeCache::new(),
            instances: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    pub fn temp(&self) -> &ModelTemp {
        &self.temp
    }

    pub fn cache(&self) -> &SizeCache {
        &self.cache
    }

    pub fn shared(&self) -> ModelRef<'_> {
        ModelRef {
            name: &self.name,
            params: &self.params,
            temp: &self.temp,
        }
    }

    /// Place a new instance, allocating its internal nodes.
    pub fn add_instance(
        &mut self,
        name: impl Into<String>,
        nodes: ExternalNodes,
        params: InstanceParams,
        alloc: &mut dyn NodeAllocator,
    ) -> Result<&mut Instance> {
        let name = name.into();
        if self.instance(&name).is_some() {
            return Err(Error::DuplicateInstance(name));
        }
        let shared = ModelRef {
            name: &self.name,
            params: &self.params,
            temp: &self.temp,
        };
        let inst = Instance::new(name, &shared, &mut self.cache, nodes, params, alloc)?;
        self.instances.push(inst);
        let last = self.instances.len() - 1;
        Ok(&mut self.instances[last])
    }

    /// Change the ambient temperature (K).
    ///
    /// Flushes the size cache and re-resolves every instance. A geometry
    /// fault at the new temperature is fatal.
    pub fn set_temperature(&mut self, temp: f64) -> Result<()> {
        log::debug!("model {}: temperature {:.2} K -> {:.2} K", self.name, self.temp.temp, temp);
        self.temp = ModelTemp::new(temp, self.params.tnom);
        self.cache.flush();
        let shared = ModelRef {
            name: &self.name,
            params: &self.params,
            temp: &self.temp,
        };
        for inst in &mut self.instances {
            inst.resolve_temperature(&shared, &mut self.cache)?;
        }
        Ok(())
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn instances_mut(&mut self) -> &mut [Instance] {
        &mut self.instances
    }

    pub fn instance(&self, name: &str) -> Option<&Instance> {
        self.instances.iter().find(|i| i.name() == name)
    }

    pub fn instance_mut(&mut self, name: &str) -> Option<&mut Instance> {
        self.instances.iter_mut().find(|i| i.name() == name)
    }

    /// Shared model data alongside mutable instances.
    pub fn split_mut(&mut self) -> (ModelRef<'_>, &mut [Instance]) {
        (
            ModelRef {
                name: &self.name,
                params: &self.params,
                temp: &self.temp,
            },
            &mut self.instances,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soistamp_core::{NodeId, NodeTable};
    use std::sync::Arc;

    fn nodes(table: &mut NodeTable, prefix: &str) -> ExternalNodes {
        let d = table.add_external(format!("{prefix}d")).unwrap();
        let g = table.add_external(format!("{prefix}g")).unwrap();
        let s = table.add_external(format!("{prefix}s")).unwrap();
        ExternalNodes::new(d, g, s, NodeId::GROUND)
    }

    #[test]
    fn test_instances_share_size_records() {
        let mut table = NodeTable::new();
        let mut model = Model::new("nch", ModelParams::nmos_default()).unwrap();
        let n1 = nodes(&mut table, "a");
        let n2 = nodes(&mut table, "b");
        let n3 = nodes(&mut table, "c");
        model
            .add_instance("M1", n1, InstanceParams::with_size(1e-6, 1e-6), &mut table)
            .unwrap();
        model
            .add_instance("M2", n2, InstanceParams::with_size(1e-6, 1e-6), &mut table)
            .unwrap();
        model
            .add_instance("M3", n3, InstanceParams::with_size(2e-6, 1e-6), &mut table)
            .unwrap();

        let i = model.instances();
        assert!(Arc::ptr_eq(i[0].size_arc(), i[1].size_arc()));
        assert!(!Arc::ptr_eq(i[0].size_arc(), i[2].size_arc()));
        assert_eq!(model.cache().len(), 2);
    }

    #[test]
    fn test_duplicate_instance_rejected() {
        let mut table = NodeTable::new();
        let mut model = Model::new("nch", ModelParams::nmos_default()).unwrap();
        let n = nodes(&mut table, "");
        model
            .add_instance("M1", n, InstanceParams::default(), &mut table)
            .unwrap();
        let err = model
            .add_instance("M1", n, InstanceParams::default(), &mut table)
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateInstance(name) if name == "M1"));
    }

    #[test]
    fn test_bad_geometry_is_fatal() {
        let mut table = NodeTable::new();
        let params = ModelParams::nmos_default();
        let l = 2.0 * params.lint;
        let mut model = Model::new("nch", params).unwrap();
        let n = nodes(&mut table, "");
        let err = model
            .add_instance("M1", n, InstanceParams::with_size(l, 1e-6), &mut table)
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(model.instances().is_empty());
    }

    #[test]
    fn test_temperature_change_flushes_cache() {
        let mut table = NodeTable::new();
        let mut model = Model::new("nch", ModelParams::nmos_default()).unwrap();
        let n = nodes(&mut table, "");
        model
            .add_instance("M1", n, InstanceParams::default(), &mut table)
            .unwrap();
        let before = model.instances()[0].size().vth0;

        model.set_temperature(400.0).unwrap();
        assert_eq!(model.temp().temp, 400.0);
        assert_eq!(model.cache().len(), 1);
        assert!(model.instances()[0].size().vth0 < before);
    }

    #[test]
    fn test_instance_body_network_needs_positive_resistance() {
        let mut table = NodeTable::new();
        let mut params = ModelParams::nmos_default();
        params.rbdb = 0.0;
        let mut model = Model::new("nch", params).unwrap();
        let n = nodes(&mut table, "");
        let mut inst = InstanceParams::default();
        inst.rbody_mod = Some(true);
        let err = model.add_instance("M1", n, inst, &mut table).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "rbdb", .. }));
        assert!(model.instances().is_empty());

        // left off, the zero resistance is never used
        model
            .add_instance("M2", n, InstanceParams::default(), &mut table)
            .unwrap();
        assert_eq!(model.instances()[0].parasitics().grbdb, 0.0);
    }

    #[test]
    fn test_invalid_model_rejected() {
        let mut params = ModelParams::nmos_default();
        params.tnom = -1.0;
        assert!(matches!(
            Model::new("bad", params),
            Err(Error::InvalidParameter { name: "tnom", .. })
        ));
    }
}
