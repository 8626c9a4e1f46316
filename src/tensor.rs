use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use rand::distributions::{Distribution, Uniform};

use crate::error::{BenchError, Result};

type Storage = Arc<RwLock<Vec<f32>>>;

/// NCHW f32 buffer.
///
/// Clones share storage, so an asynchronous device can hold on to a blob
/// until the work using it has completed.
#[derive(Debug, Clone)]
pub struct Blob {
    data: Storage,
    shape: Vec<usize>,
}

impl Blob {
    pub fn empty() -> Blob {
        Blob {
            data: Arc::new(RwLock::new(Vec::new())),
            shape: vec![],
        }
    }

    pub fn zeros(shape: Vec<usize>) -> Result<Blob> {
        let data = alloc(shape.iter().product(), "blob")?;
        Ok(Blob {
            data: Arc::new(RwLock::new(data)),
            shape,
        })
    }

    pub fn from_vec(data: Vec<f32>, shape: Vec<usize>) -> Blob {
        assert_eq!(
            data.len(),
            shape.iter().product::<usize>(),
            "invalid shape for data length"
        );

        Blob {
            data: Arc::new(RwLock::new(data)),
            shape,
        }
    }

    pub fn rand(shape: Vec<usize>) -> Result<Blob> {
        let blob = Blob::zeros(shape)?;
        let uniform = Uniform::new(-1.0f32, 1.0);
        let mut rng = rand::thread_rng();
        blob.write()
            .iter_mut()
            .for_each(|x| *x = uniform.sample(&mut rng));

        Ok(blob)
    }

    /// Replaces the storage with zeros of the new shape. Existing clones keep
    /// the old storage.
    pub fn reshape(&mut self, shape: Vec<usize>) -> Result<()> {
        let data = alloc(shape.iter().product(), "reshaped blob")?;
        self.data = Arc::new(RwLock::new(data));
        self.shape = shape;
        Ok(())
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Vec<f32>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<f32>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.read().clone()
    }

    /// Handle that stays valid only while some clone of this blob is alive.
    pub fn downgrade(&self) -> Weak<RwLock<Vec<f32>>> {
        Arc::downgrade(&self.data)
    }
}

fn alloc(elements: usize, what: &'static str) -> Result<Vec<f32>> {
    let mut data = Vec::new();
    data.try_reserve_exact(elements)
        .map_err(|_| BenchError::ResourceExhausted { what, elements })?;
    data.resize(elements, 0.0);
    Ok(data)
}
