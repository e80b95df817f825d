//! NumPy array inputs (`.npy` and `.npz`).
//!
//! Arrays may be stored as `float64` or `float32`; both load as `f64`.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use ndarray::{Array, Array1, Array2, Array3, Array4, Axis, Dimension, Ix1};
use ndarray_npy::{NpzReader, ReadNpyExt, read_npy};
use tracing::debug;

/// One 2-D heatmap grid.
pub fn load_grid(path: &Path) -> Result<Array2<f64>> {
    read_float_npy(path)
}

/// Simulated tongues `[session, repeat, y, x]` averaged over repeats.
pub fn load_session_means(path: &Path) -> Result<Array3<f64>> {
    let stack: Array4<f64> = read_float_npy(path)?;
    stack
        .mean_axis(Axis(1))
        .ok_or_else(|| anyhow!("{} has no repeats to average", path.display()))
}

/// One named 1-D array from an `.npz` archive.
pub fn load_npz_vector(path: &Path, name: &str) -> Result<Array1<f64>> {
    ensure_exists(path)?;
    let mut last_err = None;
    for entry in [name.to_string(), format!("{name}.npy")] {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let mut npz = NpzReader::new(file).with_context(|| format!("read {}", path.display()))?;
        match npz.by_name::<ndarray::OwnedRepr<f64>, Ix1>(&entry) {
            Ok(values) => return Ok(values),
            Err(err) => last_err = Some(err),
        }
        match npz.by_name::<ndarray::OwnedRepr<f32>, Ix1>(&entry) {
            Ok(values) => return Ok(values.mapv(f64::from)),
            Err(err) => last_err = Some(err),
        }
    }
    match last_err {
        Some(err) => Err(err).with_context(|| format!("read {name} from {}", path.display())),
        None => Err(anyhow!("read {name} from {}", path.display())),
    }
}

fn read_float_npy<D: Dimension>(path: &Path) -> Result<Array<f64, D>>
where
    Array<f64, D>: ReadNpyExt,
    Array<f32, D>: ReadNpyExt,
{
    ensure_exists(path)?;
    let values = match read_npy::<_, Array<f64, D>>(path) {
        Ok(values) => values,
        Err(wide_err) => match read_npy::<_, Array<f32, D>>(path) {
            Ok(values) => values.mapv(f64::from),
            Err(_) => {
                return Err(wide_err).with_context(|| format!("read {}", path.display()));
            }
        },
    };
    debug!(path = %path.display(), shape = ?values.shape(), "array loaded");
    Ok(values)
}

fn ensure_exists(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(anyhow!("array file not found: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use ndarray_npy::{NpzWriter, write_npy};

    #[test]
    fn float32_grids_load_as_f64() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("average_bat.npy");
        write_npy(&path, &array![[0.25f32, 0.5], [0.75, 1.0]]).expect("write");
        assert_eq!(load_grid(&path).expect("load"), array![[0.25, 0.5], [0.75, 1.0]]);
    }

    #[test]
    fn session_means_average_repeats() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("highres_arnold_tongues.npy");
        let stack = Array4::from_shape_fn((2, 2, 1, 2), |(s, r, _, x)| (s * 10 + r * 2 + x) as f64);
        write_npy(&path, &stack).expect("write");

        let means = load_session_means(&path).expect("load");
        assert_eq!(means.shape(), &[2, 1, 2]);
        assert_eq!(means[[0, 0, 0]], 1.0);
        assert_eq!(means[[1, 0, 1]], 12.0);
    }

    #[test]
    fn wrong_dimensionality_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("average_bat.npy");
        write_npy(&path, &array![1.0f64, 2.0]).expect("write");
        let err = load_grid(&path).expect_err("1-d");
        assert!(format!("{err:#}").contains("average_bat.npy"));
    }

    #[test]
    fn missing_array_names_the_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("session_1/continuous_bat.npy");
        let err = load_grid(&path).expect_err("missing");
        assert!(err.to_string().contains("array file not found"));
    }

    #[test]
    fn reads_named_npz_entry() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("transfer_model_comparison.npz");
        let mut npz = NpzWriter::new(File::create(&path).expect("create"));
        npz.add_array("delta_AIC", &array![-2.0f64, 3.5]).expect("add");
        npz.finish().expect("finish");

        assert_eq!(
            load_npz_vector(&path, "delta_AIC").expect("load"),
            array![-2.0, 3.5]
        );
        assert!(load_npz_vector(&path, "AIC").is_err());
    }
}
