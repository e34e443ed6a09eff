pub mod cache;
pub mod config;
pub mod disposable;
pub mod error;
pub mod event;
pub mod feed;
pub mod observable;
pub mod scheduler;
pub mod session;
pub mod subject;
pub mod transport;
pub mod util;

pub use cache::ResponseCache;
pub use config::ClientConfig;
pub use disposable::{CompositeDisposable, Disposable, DisposeBag, SerialDisposable};
pub use error::Error;
pub use event::{Event, Observer, Terminal};
pub use observable::{EventStream, Observable, Subscriber};
pub use scheduler::Scheduler;
pub use session::Session;
pub use subject::{BehaviorRelay, BehaviorSubject, PublishSubject, ReplaySubject};
pub use transport::{ReqwestTransport, Request, Response, Transport};
