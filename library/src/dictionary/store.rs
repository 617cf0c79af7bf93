use std::{
    io::{BufReader, BufWriter},
    time::SystemTime,
};

use log::info;
use vfs::VfsPath;

use crate::{dictionary::ReadingDictionary, serialization::Serializable};

/// A reading dictionary tied to its on-disk `.dat` file.
pub struct DictionaryFile {
    path: VfsPath,
    last_modified: Option<SystemTime>,
    pub dictionary: ReadingDictionary,
}

impl DictionaryFile {
    pub fn create(path: &VfsPath, language: &str) -> Self {
        Self {
            path: path.clone(),
            last_modified: None,
            dictionary: ReadingDictionary::create(language.to_owned()),
        }
    }

    pub fn load(path: &VfsPath) -> anyhow::Result<Self> {
        let last_modified = path.metadata()?.modified;
        let mut file = BufReader::new(path.open_file()?);
        let dictionary = ReadingDictionary::deserialize(&mut file)?;

        info!("Loaded {} readings from {}", dictionary.len(), path.as_str());
        Ok(Self {
            path: path.clone(),
            last_modified,
            dictionary,
        })
    }

    pub fn load_or_create(path: &VfsPath, language: &str) -> anyhow::Result<Self> {
        if path.exists()? {
            Self::load(path)
        } else {
            Ok(Self::create(path, language))
        }
    }

    pub fn merge(&mut self, other: Self) {
        self.dictionary.merge(other.dictionary);
        self.last_modified = self.last_modified.max(other.last_modified);
    }

    /// Saves back to the main file, merging with on-disk changes to avoid
    /// lost updates.
    pub fn save(&mut self) -> anyhow::Result<()> {
        let main_path = self.path.clone();
        let temp_path = main_path
            .parent()
            .join(format!("{}~", main_path.filename()))?;

        let modified_if_exists =
            |p: &VfsPath| -> Result<Option<SystemTime>, vfs::error::VfsError> {
                if p.exists()? {
                    Ok(p.metadata()?.modified)
                } else {
                    Ok(None)
                }
            };

        loop {
            let modified_pre = modified_if_exists(&main_path)?;

            // Reconcile with on-disk changes before writing
            let on_disk_is_newer = match (self.last_modified, modified_pre) {
                (Some(last), Some(saved)) => saved > last,
                (None, _) => main_path.exists()?,
                (Some(_), None) => false,
            };
            if on_disk_is_newer {
                let on_disk = Self::load(&main_path)?;
                self.merge(on_disk);
            }

            // Write to temp, then swap if the file did not change during the write
            {
                let mut file = BufWriter::new(temp_path.create_file()?);
                self.dictionary.serialize(&mut file)?;
            }

            let modified_post = modified_if_exists(&main_path)?;
            if modified_post == modified_pre || modified_pre.is_none() {
                if main_path.exists()? {
                    main_path.remove_file()?;
                }
                temp_path.move_file(&main_path)?;
                self.last_modified = modified_if_exists(&main_path)?;
                break;
            }

            // Someone modified the file concurrently; loop to merge again
        }

        Ok(())
    }
}
