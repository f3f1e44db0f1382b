use std::path::Path;
use std::path::PathBuf;
use std::io;
use std::fs;
use std::fs::File;
use std::sync::Arc;
use std::thread;

use serde::Deserialize;

use super::compose::ComposeOptions;
use super::compose::Compositor;
use super::compose::output::EncodedImage;
use super::compose::output::OutputMode;
use super::compose::overlay::OverlayStyle;
use super::compose::source::ImageSource;


pub const MAX_THREAD: usize = 16;

pub struct AppOptions {
    compose_options: ComposeOptions,
    asset_folder: PathBuf,
    style: OverlayStyle,
    output_mode: OutputMode,
    thread_num: usize,
}

impl Default for AppOptions {
    fn default() -> Self {
        let mut asset_folder = curdir();
        asset_folder.push("assets");
        AppOptions {
            compose_options: Default::default(),
            asset_folder,
            style: Default::default(),
            output_mode: Default::default(),
            thread_num: 1
        }
    }
}

/// Shape of the optional JSON config file. Every key may be omitted.
#[derive(Deserialize, Default, Debug)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    assets: Option<PathBuf>,
    style: Option<String>,
    sizing: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    filter: Option<String>,
    max_canvas_pixels: Option<u64>,
    threads: Option<usize>,
}

impl AppOptions {

    pub fn compose_options_mut(&mut self) -> &mut ComposeOptions {
        &mut self.compose_options
    }

    /// Clamped to `1..=MAX_THREAD`.
    pub fn set_thread_num(&mut self, thread_num: usize) {
        self.thread_num = thread_num.clamp(1, MAX_THREAD);
    }

    pub fn set_asset_folder(&mut self, path: &str) {
        self.asset_folder = PathBuf::from(path);
    }

    pub fn asset_folder(&self) -> &Path {
        self.asset_folder.as_path()
    }

    pub fn set_style(&mut self, style: OverlayStyle) {
        self.style = style;
    }

    pub fn set_output_mode(&mut self, mode: OutputMode) {
        self.output_mode = mode;
    }

    pub fn output_mode(&self) -> OutputMode {
        self.output_mode
    }

    pub fn into_compositor(self) -> Compositor {
        Compositor::with_assets(self.compose_options, self.asset_folder)
    }

    pub fn load_config(&mut self, path: &Path) -> io::Result<()> {
        let ifile = File::open(path)?;
        let config: ConfigFile = serde_json::from_reader(io::BufReader::new(ifile))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.apply(config)
    }

    fn apply(&mut self, config: ConfigFile) -> io::Result<()> {
        let invalid = |e: String| io::Error::new(io::ErrorKind::InvalidInput, e);
        if let Some(assets) = config.assets {
            self.asset_folder = assets;
        }
        if let Some(style) = config.style {
            self.style = style.parse().map_err(invalid)?;
        }
        if let Some(sizing) = config.sizing {
            self.compose_options.set_sizing(sizing.parse().map_err(invalid)?);
        }
        if config.width.is_some() || config.height.is_some() {
            let (w, h) = self.compose_options.size();
            self.compose_options.set_size(config.width.unwrap_or(w), config.height.unwrap_or(h));
        }
        if let Some(filter) = config.filter {
            if !self.compose_options.set_filter(&filter) {
                return Err(invalid(format!("unknown filter `{}`", filter)));
            }
        }
        if let Some(max) = config.max_canvas_pixels {
            self.compose_options.set_max_canvas_pixels(max);
        }
        if let Some(threads) = config.threads {
            self.set_thread_num(threads);
        }
        Ok(())
    }
}


#[derive(Debug, Clone)]
pub struct ComposeTask {
    pub src: PathBuf,
    pub tgt: PathBuf,
}

pub struct Application {
    style: OverlayStyle,
    output_mode: OutputMode,
    thread_num: usize,
    compositor: Compositor,
}

impl Application {

    pub fn new(options: AppOptions) -> Self {
        Application {
            style: options.style,
            output_mode: options.output_mode,
            thread_num: options.thread_num,
            compositor: options.into_compositor(),
        }
    }

    /// Every `.png`, `.jpg` or `.jpeg` in `input_folder`, targeting `<stem>-story.png`
    /// (or `.txt` for base64 output) in `output_folder`.
    pub fn list_files(&self, input_folder: &Path, output_folder: &Path) -> Vec<ComposeTask> {
        const EXT: [&'static str; 3] = ["png", "jpg", "jpeg"];
        let suffix = match self.output_mode {
            OutputMode::Png => "png",
            OutputMode::Base64 => "txt",
        };
        if let Ok(read_dir) = input_folder.read_dir() {
            let mut tasks: Vec<_> = read_dir.filter_map(|entry| {
                let src = entry.ok()?.path();
                let ext = src.extension()?.to_str()?.to_ascii_lowercase();
                if !EXT.contains(&ext.as_str()) {
                    return None;
                }
                let stem = src.file_stem()?.to_str()?;
                let tgt = output_folder.join(format!("{}-story.{}", stem, suffix));
                Some(ComposeTask{src, tgt})
            }).collect();
            tasks.sort_by(|a, b| a.src.cmp(&b.src));
            tasks
        } else {
            Vec::new()
        }
    }

    pub fn compose_one(&self, src: &Path, tgt: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let source = ImageSource::Path(src.to_path_buf());
        let encoded = self.compositor.compose(source, Some(self.style), self.output_mode)?;
        write_output(tgt, encoded)
    }

    /// Splits `tasks` into `thread_num` contiguous slices, one worker thread each.
    /// Returns how many tasks failed.
    pub fn alloc_tasks(this: Arc<Self>, mut tasks: Vec<ComposeTask>) -> io::Result<usize> {
        let thread_num = this.thread_num;
        let divide = std::cmp::max((tasks.len() + thread_num - 1) / thread_num, 1);
        let mut i = 0;
        let mut ths = Vec::new();
        let mut c = 0;
        while i < tasks.len() {
            let j = std::cmp::min(i + divide, tasks.len());
            let slice = Vec::from(&tasks[i..j]);
            let that = this.clone();
            let th = thread::Builder::new()
                .name(format!("work-{}", c))
                .spawn(move|| {
                let mut failed = 0;
                for task in &slice {
                    if let Err(e) = that.compose_one(task.src.as_path(), task.tgt.as_path()) {
                        log::warn!("[{}] {} error: {}", thread::current().name().unwrap_or_default(), task.src.display(), e);
                        failed += 1;
                    } else {
                        log::info!("[{}] {} finished", thread::current().name().unwrap_or_default(), task.tgt.display());
                    }
                }
                failed
            })?;
            ths.push(th);
            i = j;
            c += 1;
        }
        tasks.clear();
        let mut failed = 0;
        for th in ths {
            match th.join() {
                Ok(n) => failed += n,
                Err(_) => {
                    log::error!("worker thread panicked");
                    failed += divide;
                }
            }
        }
        Ok(failed)
    }
}

fn write_output(tgt: &Path, encoded: EncodedImage) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = tgt.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            fs::create_dir_all(parent)?;
        }
    }
    let data = match encoded {
        EncodedImage::Png(data) => data,
        EncodedImage::DataUrl(url) => url.into_bytes(),
    };
    fs::write(tgt, data)?;
    Ok(())
}

pub fn curdir() -> PathBuf {
    use std::env::current_exe;

    if let Ok(dir) = current_exe() {
        if let Some(path) = dir.parent() {
            PathBuf::from(path)
        } else {
            PathBuf::default()
        }
    } else {
        PathBuf::default()
    }
}
