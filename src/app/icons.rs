use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context as _, Result, bail};
use eframe::egui::ColorImage;
use log::{debug, warn};

const ICON_EDGE: u32 = 64;
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

pub(super) type IconLoader = Arc<dyn Fn(&str) -> Result<ColorImage> + Send + Sync>;
pub(super) type RepaintHook = Arc<dyn Fn() + Send + Sync>;

enum IconSlot<T> {
    Pending,
    Ready(T),
}

pub(super) enum IconLookup<'a, T> {
    Ready(&'a T),
    Pending,
    Unavailable,
}

struct DecodeJob {
    id: String,
    url: String,
}

type DecodeResult = (String, Result<ColorImage, String>);

/// Bounded LRU of decoded icons keyed by node id. Failed ids live outside the LRU and
/// are never fetched again; an id is never queued twice while its decode is in flight.
pub(super) struct IconCache<T> {
    capacity: usize,
    slots: HashMap<String, IconSlot<T>>,
    order: VecDeque<String>,
    failed: HashSet<String>,
    in_flight: HashSet<String>,
    loader: IconLoader,
    repaint: RepaintHook,
    mounted: Arc<AtomicBool>,
    jobs: Option<Sender<DecodeJob>>,
    results_tx: Sender<DecodeResult>,
    results_rx: Receiver<DecodeResult>,
}

impl<T> IconCache<T> {
    pub(super) fn new(
        capacity: usize,
        loader: IconLoader,
        repaint: RepaintHook,
        mounted: Arc<AtomicBool>,
    ) -> Self {
        let (results_tx, results_rx) = mpsc::channel();
        Self {
            capacity: capacity.max(1),
            slots: HashMap::new(),
            order: VecDeque::new(),
            failed: HashSet::new(),
            in_flight: HashSet::new(),
            loader,
            repaint,
            mounted,
            jobs: None,
            results_tx,
            results_rx,
        }
    }

    pub(super) fn len(&self) -> usize {
        self.slots.len()
    }

    #[cfg(test)]
    pub(super) fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    pub(super) fn request(&mut self, id: &str, url: &str) -> IconLookup<'_, T> {
        if self.failed.contains(id) {
            return IconLookup::Unavailable;
        }

        if self.slots.contains_key(id) {
            self.touch(id);
        } else {
            self.insert(id, IconSlot::Pending);
            if self.in_flight.insert(id.to_owned()) {
                self.schedule(id, url);
            }
        }

        match self.slots.get(id) {
            Some(IconSlot::Ready(icon)) => IconLookup::Ready(icon),
            Some(IconSlot::Pending) | None => IconLookup::Pending,
        }
    }

    pub(super) fn poll(&mut self, mut upload: impl FnMut(&str, ColorImage) -> T) -> usize {
        let mut received = 0;
        loop {
            let (id, result) = match self.results_rx.try_recv() {
                Ok(message) => message,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            };

            self.in_flight.remove(&id);
            match result {
                Ok(image) => {
                    let icon = IconSlot::Ready(upload(&id, image));
                    match self.slots.get_mut(&id) {
                        Some(slot) => *slot = icon,
                        // Evicted while decoding.
                        None => self.insert(&id, icon),
                    }
                }
                Err(error) => {
                    warn!("icon for {id} is unavailable: {error}");
                    self.forget(&id);
                    self.failed.insert(id);
                }
            }
            received += 1;
        }
        received
    }

    fn touch(&mut self, id: &str) {
        if let Some(position) = self.order.iter().position(|entry| entry == id)
            && let Some(entry) = self.order.remove(position)
        {
            self.order.push_back(entry);
        }
    }

    fn insert(&mut self, id: &str, slot: IconSlot<T>) {
        if self.slots.len() >= self.capacity {
            self.evict_oldest();
        }
        self.slots.insert(id.to_owned(), slot);
        self.order.push_back(id.to_owned());
    }

    fn forget(&mut self, id: &str) {
        if self.slots.remove(id).is_some() {
            self.order.retain(|entry| entry != id);
        }
    }

    fn evict_oldest(&mut self) {
        if let Some(oldest) = self.order.pop_front() {
            debug!("evicting icon {oldest}");
            self.slots.remove(&oldest);
        }
    }

    fn schedule(&mut self, id: &str, url: &str) {
        let job = DecodeJob {
            id: id.to_owned(),
            url: url.to_owned(),
        };

        let job = match self.jobs.as_ref() {
            Some(jobs) => match jobs.send(job) {
                Ok(()) => return,
                Err(mpsc::SendError(job)) => job,
            },
            None => job,
        };

        let jobs = self.spawn_worker();
        if let Err(mpsc::SendError(job)) = jobs.send(job) {
            warn!("icon worker is gone, {} stays pending", job.id);
        }
        self.jobs = Some(jobs);
    }

    fn spawn_worker(&self) -> Sender<DecodeJob> {
        let (jobs_tx, jobs_rx) = mpsc::channel::<DecodeJob>();
        let loader = Arc::clone(&self.loader);
        let repaint = Arc::clone(&self.repaint);
        let mounted = Arc::clone(&self.mounted);
        let results = self.results_tx.clone();

        thread::spawn(move || {
            for job in jobs_rx {
                let result = loader(&job.url).map_err(|error| format!("{error:#}"));
                if !mounted.load(Ordering::Acquire) {
                    break;
                }
                if results.send((job.id, result)).is_err() {
                    break;
                }
                repaint();
            }
        });

        jobs_tx
    }
}

pub(super) fn fetch_icon(url: &str) -> Result<ColorImage> {
    let bytes = if url.starts_with("http://") || url.starts_with("https://") {
        let client = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        let response = client
            .get(url)
            .send()
            .with_context(|| format!("failed to request {url}"))?
            .error_for_status()
            .with_context(|| format!("icon request for {url} was rejected"))?;
        response
            .bytes()
            .with_context(|| format!("failed to read icon body from {url}"))?
            .to_vec()
    } else {
        let path = url.strip_prefix("file://").unwrap_or(url);
        if path.is_empty() {
            bail!("icon url is empty");
        }
        std::fs::read(path).with_context(|| format!("failed to read icon file {path}"))?
    };

    let decoded = image::load_from_memory(&bytes)
        .with_context(|| format!("failed to decode icon from {url}"))?
        .thumbnail(ICON_EDGE, ICON_EDGE)
        .to_rgba8();
    let size = [decoded.width() as usize, decoded.height() as usize];
    Ok(ColorImage::from_rgba_unmultiplied(size, decoded.as_raw()))
}
