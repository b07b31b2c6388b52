use crate::{Injectable, InterfaceFor, Lifetime, Registration};

/// A collection of registrations that can be added all at once to an
/// [`InjectorBuilder`](crate::InjectorBuilder). Modules can be used to group
/// together related services, such as everything a storage layer provides,
/// and configure the injector in pieces rather than all at once.
///
/// For creating a module easily via a domain specific language, see
/// [`define_module!`].
#[derive(Debug, Default)]
pub struct Module {
    pub(crate) registrations: Vec<Registration>,
}

impl Module {
    /// Adds a registration to this module.
    pub fn provide(&mut self, registration: impl Into<Registration>) {
        self.registrations.push(registration.into());
    }

    /// Registers `I` as the implementation of the service `S`.
    pub fn register<S, I>(&mut self, lifetime: Lifetime)
    where
        S: ?Sized + InterfaceFor<I>,
        I: Injectable,
    {
        self.provide(Registration::new::<S, I>(lifetime));
    }

    /// The number of registrations in this module.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Whether this module has no registrations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

/// Defines a new module using a domain specific language.
///
/// ## Example
///
/// ```
/// use scoped_injector::{
///     constant, define_module, interface, Injector, IntoScoped, IntoSingleton,
///     Service, Svc,
/// };
///
/// struct Engine(Svc<String>);
/// struct Session(Svc<Engine>);
///
/// trait Clock: Service {
///     fn now(&self) -> u64;
/// }
/// interface!(Clock);
///
/// struct FixedClock;
/// impl Clock for FixedClock {
///     fn now(&self) -> u64 {
///         42
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let module = define_module! {
///     services = [
///         constant("sqlite::memory:".to_owned()),
///         Engine.singleton(),
///         Session.scoped(),
///     ],
///     interfaces = {
///         dyn Clock = [(|| FixedClock).singleton()],
///     },
/// };
/// assert_eq!(4, module.len());
///
/// let mut builder = Injector::builder();
/// builder.add_module(module);
///
/// let injector = builder.build();
/// let scope = injector.begin_scope();
/// let session: Svc<Session> = scope.resolve().await.unwrap();
/// let clock: Svc<dyn Clock> = scope.resolve().await.unwrap();
///
/// assert_eq!("sqlite::memory:", *session.0 .0);
/// assert_eq!(42, clock.now());
/// # }
/// ```
#[macro_export]
macro_rules! define_module {
    {
        $(
            $(#[$($attr:meta),*])*
            $key:ident = $value:tt
        ),*
        $(,)?
    } => {
        {
            #[allow(unused_mut)]
            let mut module = <$crate::Module as ::std::default::Default>::default();
            $(
                $(#[$($attr),*])*
                $crate::define_module!(@provide &mut module, $key = $value);
            )*
            module
        }
    };
    (
        @provide $module:expr,
        services = [
            $($service:expr),*
            $(,)?
        ]
    ) => {
        $($module.provide($service);)*
    };
    (
        @provide $module:expr,
        interfaces = {
            $($interface:ty = [
                $($implementation:expr),*
                $(,)?
            ]),*
            $(,)?
        }
    ) => {
        $(
            $($module.provide(($implementation).with_interface::<$interface>());)*
        )*
    };
}
