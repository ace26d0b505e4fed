use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path,PathBuf};

pub type HeadfileMap = BTreeMap<String,String>;

/// A plain text file of `key=value` lines. Keys are written in sorted order so the same
/// map always produces the same bytes.
pub struct Headfile{
    file:PathBuf
}

impl Headfile{

    pub fn new(file_path:&Path) -> io::Result<Self> {
        File::create(file_path)?;
        Ok(Self {
            file:file_path.to_owned()
        })
    }

    pub fn open(file_path:&Path) -> io::Result<Self> {
        match file_path.exists() {
            false => Headfile::new(file_path),
            true => Ok(Self{
                file:file_path.to_owned()
            })
        }
    }

    /// open a headfile that must already exist
    pub fn existing(file_path:&Path) -> io::Result<Self> {
        match file_path.exists() {
            true => Ok(Self{
                file:file_path.to_owned()
            }),
            false => Err(io::Error::new(io::ErrorKind::NotFound,format!("headfile {:?} not found",file_path)))
        }
    }

    pub fn path(&self) -> &Path {
        &self.file
    }

    pub fn read(&self) -> io::Result<HeadfileMap> {
        let mut f = File::open(&self.file)?;
        let mut s = String::new();
        f.read_to_string(&mut s)?;
        Ok(Self::txt_to_hash(&s))
    }

    /// merge entries into the file. New values replace old values with the same key.
    pub fn append(&self,hash:&HeadfileMap) -> io::Result<()> {
        let mut h1 = self.read()?;
        h1.extend(hash.iter().map(|(k,v)| (k.clone(),v.clone())));
        let txt = Self::hash_to_txt(&h1);
        let mut f = File::create(&self.file)?;
        f.write_all(txt.as_bytes())
    }

    pub fn hash_to_txt(hash:&HeadfileMap) -> String {
        let mut strbuf = String::new();
        for (key, val) in hash.iter() {
            strbuf.push_str(key);
            strbuf.push('=');
            strbuf.push_str(val);
            strbuf.push('\n');
        }
        strbuf
    }

    pub fn txt_to_hash(headfile_str:&str) -> HeadfileMap {
        let mut hf = HeadfileMap::new();
        headfile_str.lines().for_each(|line|{
            let line = line.trim_end_matches('\r');
            if line.starts_with('#') {
                return
            }
            // split on the first = we find
            match line.find('='){
                Some(index) => {
                    let (key,val) = line.split_at(index);
                    hf.insert(key.trim().to_string(),val[1..].to_string());
                },
                None => () // do not add to hash if "=" not found
            }
        });
        hf
    }

}

/// types that describe themselves as headfile entries
pub trait ToHeadfile {
    fn to_hash(&self) -> HeadfileMap;
}
