//! Batch distribution across accelerators.
//!
//! A training step feeds a mapping of named tensors whose leading axis is the
//! batch. With `k` accelerators every tensor is cut into `k` equal, contiguous
//! slices along that axis and each device receives one slice of every tensor.

use std::collections::{BTreeMap, HashSet};

use ndarray::{ArrayD, ArrayViewD, Axis, Slice};
use tracing::debug;

use crate::device::{DeviceProvider, HOST_DEVICE};
use crate::error::{Error, Result};

/// Named tensors sharing a leading batch axis.
pub type TensorMap<T> = BTreeMap<String, ArrayD<T>>;

/// The tensors assigned to one device.
#[derive(Debug, Clone, PartialEq)]
pub struct Shard<T> {
    pub device: String,
    pub tensors: TensorMap<T>,
}

/// Per-device tensor mappings, kept in device order.
#[derive(Debug, Clone, PartialEq)]
pub struct ShardedBatch<T> {
    shards: Vec<Shard<T>>,
}

impl<T> ShardedBatch<T> {
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Look up the mapping assigned to `device`.
    pub fn get(&self, device: &str) -> Option<&TensorMap<T>> {
        self.shards
            .iter()
            .find(|s| s.device == device)
            .map(|s| &s.tensors)
    }

    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.shards.iter().map(|s| s.device.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Shard<T>> {
        self.shards.iter()
    }

    pub fn into_shards(self) -> Vec<Shard<T>> {
        self.shards
    }
}

impl<T: Clone> ShardedBatch<T> {
    /// Concatenate the slices of `key` back together in device order.
    pub fn gather(&self, key: &str) -> Result<ArrayD<T>> {
        let views: Vec<ArrayViewD<'_, T>> = self
            .shards
            .iter()
            .map(|s| {
                s.tensors.get(key).map(|a| a.view()).ok_or_else(|| {
                    Error::invalid_value(format!("key '{key}' missing on device {}", s.device))
                })
            })
            .collect::<Result<_>>()?;
        ndarray::concatenate(Axis(0), &views).map_err(|e| Error::shape(e.to_string()))
    }
}

impl<T> IntoIterator for ShardedBatch<T> {
    type Item = Shard<T>;
    type IntoIter = std::vec::IntoIter<Shard<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.shards.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a ShardedBatch<T> {
    type Item = &'a Shard<T>;
    type IntoIter = std::slice::Iter<'a, Shard<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.shards.iter()
    }
}

/// Split every tensor in `tensors` across the first `accelerators` devices
/// reported by `provider`.
///
/// With zero accelerators the mapping is returned untouched under
/// [`HOST_DEVICE`] and the provider is not consulted. The selected devices
/// must be distinct, and the batch size must be an exact multiple of
/// `accelerators`; nothing is padded.
pub fn distribute<T: Clone>(
    tensors: TensorMap<T>,
    accelerators: usize,
    provider: &dyn DeviceProvider,
) -> Result<ShardedBatch<T>> {
    if accelerators == 0 {
        return Ok(ShardedBatch {
            shards: vec![Shard {
                device: HOST_DEVICE.to_string(),
                tensors,
            }],
        });
    }

    let mut devices = provider.devices();
    if accelerators > devices.len() {
        return Err(Error::DeviceCount {
            requested: accelerators,
            available: devices.len(),
        });
    }
    devices.truncate(accelerators);
    let mut seen = HashSet::new();
    if let Some(dup) = devices.iter().find(|d| !seen.insert(d.as_str())) {
        return Err(Error::DuplicateDevice(dup.clone()));
    }

    let batch = batch_size(&tensors)?;
    if batch % accelerators != 0 {
        return Err(Error::shape(format!(
            "batch size {batch} is not divisible by {accelerators} accelerators"
        )));
    }
    let per_device = batch / accelerators;
    debug!(batch, accelerators, per_device, keys = tensors.len(), "Distributing batch");

    let mut shards: Vec<Shard<T>> = devices
        .into_iter()
        .map(|device| Shard {
            device,
            tensors: TensorMap::new(),
        })
        .collect();

    for (key, value) in &tensors {
        for (i, shard) in shards.iter_mut().enumerate() {
            let start = i * per_device;
            let chunk = value
                .slice_axis(Axis(0), Slice::from(start..start + per_device))
                .to_owned();
            shard.tensors.insert(key.clone(), chunk);
        }
    }

    Ok(ShardedBatch { shards })
}

/// Common leading-axis length of every tensor, or 0 for an empty mapping.
fn batch_size<T>(tensors: &TensorMap<T>) -> Result<usize> {
    let mut batch: Option<(usize, &str)> = None;
    for (key, value) in tensors {
        if value.ndim() == 0 {
            return Err(Error::shape(format!("tensor '{key}' has no batch axis")));
        }
        let len = value.len_of(Axis(0));
        match batch {
            None => batch = Some((len, key.as_str())),
            Some((expected, first)) if expected != len => {
                return Err(Error::shape(format!(
                    "tensor '{key}' has batch size {len}, but '{first}' has {expected}"
                )));
            }
            Some(_) => {}
        }
    }
    Ok(batch.map_or(0, |(len, _)| len))
}
