// src/image_source.rs
//
// Image supply boundary: which still image stands for each approach in a
// cycle. The returned order is the approach order (index 0 -> approach 1).

use crate::error::{Result, SignalError};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub trait ImageSource {
    /// Exactly `count` images for the next cycle, or `InsufficientInput`.
    fn next_images(&mut self, count: usize) -> Result<Vec<PathBuf>>;
}

/// Samples distinct images at random from a flat directory.
pub struct DirectoryImageSource {
    input_dir: PathBuf,
    rng: StdRng,
}

impl DirectoryImageSource {
    /// `seed` makes the sequence of samples reproducible.
    pub fn new(input_dir: impl Into<PathBuf>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            input_dir: input_dir.into(),
            rng,
        }
    }

    pub fn find_image_files(&self) -> Result<Vec<PathBuf>> {
        if !self.input_dir.is_dir() {
            return Err(SignalError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("image directory {} not found", self.input_dir.display()),
            )));
        }

        let mut images: Vec<PathBuf> = WalkDir::new(&self.input_dir)
            .max_depth(1)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_image(e.path()))
            .map(|e| e.into_path())
            .collect();

        // Directory order is platform dependent; sort so seeded samples repeat
        images.sort();

        debug!(
            "Found {} image(s) in {}",
            images.len(),
            self.input_dir.display()
        );
        Ok(images)
    }
}

impl ImageSource for DirectoryImageSource {
    fn next_images(&mut self, count: usize) -> Result<Vec<PathBuf>> {
        let all_images = self.find_image_files()?;

        if all_images.len() < count {
            return Err(SignalError::InsufficientInput {
                needed: count,
                found: all_images.len(),
            });
        }

        let picked: Vec<PathBuf> = all_images
            .choose_multiple(&mut self.rng, count)
            .cloned()
            .collect();

        for (i, path) in picked.iter().enumerate() {
            info!("Approach {} <- {}", i + 1, path.display());
        }
        Ok(picked)
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}
