use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::sync::atomic::AtomicUsize;

use bytes::BytesMut;
use bytes::BufMut;
use actix_rt::System;
use actix_web::middleware;
use actix_web::web;
use actix_web::HttpServer;
use actix_web::App;
use actix_web::HttpResponse;
use actix_web::Error as ActixError;
use actix_web::http::header;
use actix_files::NamedFile;
use actix_multipart::Multipart;
use futures::StreamExt;
use futures::TryStreamExt;
use serde::Deserialize;
use serde::de::Deserializer;
use serde::de::Visitor;
use serde::de::MapAccess;

use super::compose::Compositor;
use super::compose::output::EncodedImage;
use super::compose::output::OutputMode;
use super::compose::overlay::OverlayStyle;
use super::compose::source::ImageSource;
use super::error::ComposeError;
use super::application;


const MAX_UPLOAD_SIZE: usize = 32 * 1024 * 1024;

const DOWNLOAD_NAME: &'static str = "story-com-hud.png";

#[derive(Clone)]
pub struct ComposeServerOptions {
    host: String,
    workers: usize,
    max_tasks: usize,
    compress: bool,
    web_folder: PathBuf,
    output_mode: OutputMode,
}

impl Default for ComposeServerOptions {

    fn default() -> Self {
        let mut web_folder = application::curdir();
        web_folder.push("web");
        ComposeServerOptions {
            host: String::from("0.0.0.0:8080"),
            workers: num_cpus::get(),
            max_tasks: 16,
            compress: false,
            web_folder,
            output_mode: OutputMode::Png,
        }
    }
}

impl ComposeServerOptions {

    pub fn set_host(&mut self, host: &str) {
        self.host = String::from(host);
    }

    pub fn set_workers(&mut self, num: usize) {
        self.workers = std::cmp::max(num, 1);
    }

    pub fn set_max_tasks(&mut self, num: usize) {
        self.max_tasks = num;
    }

    pub fn set_compress(&mut self, compress: bool) {
        self.compress = compress;
    }

    pub fn set_web_folder(&mut self, path: &str) {
        self.web_folder = PathBuf::from(path);
    }

    /// Output mode for requests that carry no `output` query key.
    pub fn set_output_mode(&mut self, mode: OutputMode) {
        self.output_mode = mode;
    }
}


pub struct ComposeService {
    options: ComposeServerOptions,
    compositor: Arc<Compositor>,
    working: AtomicUsize,
}

impl ComposeService {

    pub fn new(options: ComposeServerOptions, compositor: Compositor) -> Self {
        ComposeService {
            compositor: Arc::new(compositor),
            working: AtomicUsize::new(0),
            options
        }
    }

    pub fn start(self) -> std::io::Result<()> {
        System::new().block_on(run_service(self))
    }

    fn acquire(&self) -> Option<TaskSlot<'_>> {
        let max = self.options.max_tasks;
        self.working
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| if n < max { Some(n + 1) } else { None })
            .ok()
            .map(|_| TaskSlot { working: &self.working })
    }

}

/// One in-flight composition; the slot is released on drop, also when the
/// request future is dropped mid-await.
struct TaskSlot<'a> {
    working: &'a AtomicUsize,
}

impl Drop for TaskSlot<'_> {

    fn drop(&mut self) {
        self.working.fetch_sub(1, Ordering::SeqCst);
    }
}


/// Query string of `POST /compose`.
#[derive(Debug, Default, PartialEq)]
pub struct ComposeQuery {
    style: Option<OverlayStyle>,
    output: Option<OutputMode>,
}

impl<'de> Deserialize<'de> for ComposeQuery {

    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use std::fmt;
        use serde::de;

        struct InnerVisitor;

        impl<'de> Visitor<'de> for InnerVisitor {
            type Value = ComposeQuery;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("struct ComposeQuery")
            }

            fn visit_map<V>(self, mut map: V) -> Result<Self::Value, V::Error>
            where
                V: MapAccess<'de>,
            {
                let mut res = ComposeQuery::default();
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "style" => {
                            let v: String = map.next_value()?;
                            res.style = Some(v.parse().map_err(de::Error::custom)?);
                        },
                        "output" => {
                            let v: String = map.next_value()?;
                            res.output = Some(v.parse().map_err(de::Error::custom)?);
                        },
                        _ => {
                            return Err(de::Error::unknown_field(key.as_str(), FIELDS));
                        }
                    }
                }
                Ok(res)
            }
        }

        const FIELDS: &'static [&'static str] = &["style", "output"];
        deserializer.deserialize_struct("ComposeQuery", FIELDS, InnerVisitor)
    }
}


async fn run_service(service: ComposeService) -> std::io::Result<()> {

    let options = service.options.clone();
    log::info!("listening on {} with {} workers", options.host, options.workers);
    let service = web::Data::new(service);
    let webfileroot = web::Data::new(options.web_folder.clone());
    HttpServer::new(move || {
        build_app(service.clone(), webfileroot.clone())
    })
    .bind(options.host.as_str())?
    .workers(options.workers)
    .run()
    .await
}

fn build_app(
    service: web::Data<ComposeService>,
    webfileroot: web::Data<PathBuf>,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
        Error = ActixError,
        InitError = (),
    >,
> {
    const ACTIX_LOG_FORMAT: &'static str = "%a \"%r\" %s \"%{User-Agent}i\" %D";

    let compress = service.options.compress;
    App::new()
        .wrap(middleware::Condition::new(compress, middleware::Compress::default()))
        .wrap(middleware::Logger::new(ACTIX_LOG_FORMAT))
        .app_data(webfileroot)
        .app_data(service)
        .service(
            web::resource("/compose")
                .route(web::post().to(compose))
        )
        .service(
            web::resource("/")
                .route(web::get().to(index_html))
        )
        .service(
            web::resource("/index.html")
                .route(web::get().to(index_html))
        )
        .service(
            web::resource("/index.js")
                .route(web::get().to(index_js))
        )
}


async fn index_html(root: web::Data<PathBuf>) -> actix_web::Result<NamedFile> {
    Ok(NamedFile::open(root.join("index.html"))?)
}


async fn index_js(root: web::Data<PathBuf>) -> actix_web::Result<NamedFile> {
    Ok(NamedFile::open(root.join("index.js"))?)
}


async fn compose(s: web::Data<ComposeService>, query: web::Query<ComposeQuery>, mut payload: Multipart) -> Result<HttpResponse, ActixError> {

    let _slot = match s.acquire() {
        Some(slot) => slot,
        None => return Ok(HttpResponse::TooManyRequests().finish()),
    };

    let ComposeQuery { style, output } = query.into_inner();
    let output = output.unwrap_or(s.options.output_mode);
    if let Ok(Some(mut field)) = payload.try_next().await {
        let is_image = field.content_type()
            .map(|m| m.type_().as_str() == "image")
            .unwrap_or(false);
        if !is_image {
            return Ok(
                HttpResponse::UnsupportedMediaType()
                    .body("please select an image file")
            );
        }

        let mut buf = BytesMut::with_capacity(1024 * 1024);
        while let Some(chunk) = field.next().await {
            let data = chunk?;
            if data.len() + buf.len() > MAX_UPLOAD_SIZE {
                return Ok(HttpResponse::PayloadTooLarge().finish());
            }
            buf.put(data);
        }
        let compositor = s.compositor.clone();
        let r = web::block(move || -> Result<EncodedImage, ComposeError> {
            compositor.compose(ImageSource::Payload(buf.to_vec()), style, output)
        })
        .await;

        return match r {
            Ok(Ok(EncodedImage::Png(data))) => {
                Ok(
                    HttpResponse::Ok()
                        .insert_header(header::ContentType::png())
                        .insert_header(header::ContentDisposition {
                            disposition: header::DispositionType::Attachment,
                            parameters: vec![
                                header::DispositionParam::Filename(String::from(DOWNLOAD_NAME))
                            ]
                        })
                        .body(data)
                )
            },
            Ok(Ok(EncodedImage::DataUrl(url))) => {
                Ok(
                    HttpResponse::Ok()
                        .insert_header(header::ContentType::plaintext())
                        .body(url)
                )
            },
            Ok(Err(e)) => {
                log::warn!("compose failed: {}", e);
                if e.is_input_error() {
                    Ok(HttpResponse::UnprocessableEntity().body(e.to_string()))
                } else {
                    Ok(HttpResponse::InternalServerError().body(e.to_string()))
                }
            },
            Err(e) => {
                log::error!("compose task lost: {}", e);
                Ok(HttpResponse::InternalServerError().finish())
            }
        };
    }
    Ok(HttpResponse::BadRequest().body("missing image field"))
}
