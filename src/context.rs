//! The `Context` owns every piece of simulation state.
//!
//! Modules keep their data in typed *data plugins* (see [`define_data_plugin!`]),
//! schedule work as *plans* at a point in time, and communicate through typed
//! *events*. The simulation controller schedules one plan per time step, so
//! `get_current_time()` is the number of the step being executed.
use std::any::{Any, TypeId};
use std::collections::VecDeque;
use std::rc::Rc;

use log::trace;

use crate::plan::Queue;
use crate::HashMap;

/// A type that can be stored on the `Context`. The plugin type is only a key;
/// the data lives in `DataContainer`.
pub trait DataPlugin: Any {
    type DataContainer;

    fn create_data_container() -> Self::DataContainer;
}

/// Defines a unit struct usable as a data plugin key.
///
/// ```ignore
/// define_data_plugin!(DeathCount, usize, 0);
/// *context.get_data_mut(DeathCount) += 1;
/// ```
#[macro_export]
macro_rules! define_data_plugin {
    ($plugin:ident, $data_container:ty, $default: expr) => {
        #[derive(Copy, Clone)]
        struct $plugin;

        impl $crate::context::DataPlugin for $plugin {
            type DataContainer = $data_container;

            fn create_data_container() -> Self::DataContainer {
                $default
            }
        }
    };
}
pub use define_data_plugin;

/// Marker for values that can be sent through the event bus. Events are copied
/// to every subscriber.
pub trait SimulationEvent: Copy + 'static {}

type Callback = dyn FnOnce(&mut Context);
type EventHandler<E> = dyn Fn(&mut Context, E);

pub struct Context {
    plan_queue: Queue<Box<Callback>>,
    callback_queue: VecDeque<Box<Callback>>,
    data_plugins: HashMap<TypeId, Box<dyn Any>>,
    // Actually a `HashMap<TypeId, Vec<Rc<EventHandler<E>>>>` for each event type `E`
    event_handlers: HashMap<TypeId, Box<dyn Any>>,
    current_time: f64,
    shutdown_requested: bool,
}

impl Context {
    #[must_use]
    pub fn new() -> Context {
        Context {
            plan_queue: Queue::new(),
            callback_queue: VecDeque::new(),
            data_plugins: HashMap::default(),
            event_handlers: HashMap::default(),
            current_time: 0.0,
            shutdown_requested: false,
        }
    }

    /// Schedules `callback` to run at `time`.
    ///
    /// # Panics
    ///
    /// Panics if `time` is NaN, infinite, or earlier than the current time.
    pub fn add_plan(&mut self, time: f64, callback: impl FnOnce(&mut Context) + 'static) {
        assert!(
            !time.is_nan() && !time.is_infinite() && time >= self.current_time,
            "Invalid time value"
        );
        self.plan_queue.add_plan(time, Box::new(callback));
    }

    /// Queues `callback` to run before the next plan.
    pub fn queue_callback(&mut self, callback: impl FnOnce(&mut Context) + 'static) {
        self.callback_queue.push_back(Box::new(callback));
    }

    /// Registers `handler` to be called for every emitted event of type `E`.
    pub fn subscribe_to_event<E: SimulationEvent>(
        &mut self,
        handler: impl Fn(&mut Context, E) + 'static,
    ) {
        let handlers = self
            .event_handlers
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::<Vec<Rc<EventHandler<E>>>>::default())
            .downcast_mut::<Vec<Rc<EventHandler<E>>>>()
            .expect("event handler list has the event's type");
        handlers.push(Rc::new(handler));
    }

    /// Emits `event`. Subscribers run from the callback queue, after the
    /// current plan or callback returns, in emission order.
    pub fn emit_event<E: SimulationEvent>(&mut self, event: E) {
        let Some(handlers) = self
            .event_handlers
            .get(&TypeId::of::<E>())
            .and_then(|handlers| handlers.downcast_ref::<Vec<Rc<EventHandler<E>>>>())
        else {
            return;
        };
        let handlers = handlers.clone();
        self.queue_callback(move |context| {
            for handler in &handlers {
                handler(context, event);
            }
        });
    }

    /// Returns a mutable reference to the data container for `plugin`,
    /// creating it if it does not exist yet.
    pub fn get_data_mut<T: DataPlugin>(&mut self, _plugin: T) -> &mut T::DataContainer {
        self.data_plugins
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::create_data_container()))
            .downcast_mut::<T::DataContainer>()
            .expect("data container has the plugin's type")
    }

    /// Returns the data container for `plugin` if it has been created.
    #[must_use]
    pub fn get_data<T: DataPlugin>(&self, _plugin: T) -> Option<&T::DataContainer> {
        self.data_plugins
            .get(&TypeId::of::<T>())
            .and_then(|data| data.downcast_ref::<T::DataContainer>())
    }

    #[must_use]
    pub fn get_current_time(&self) -> f64 {
        self.current_time
    }

    /// Stops `execute()` after the current plan or callback. Pending plans
    /// and callbacks are dropped.
    pub fn shutdown(&mut self) {
        trace!("shutdown requested at t={}", self.current_time);
        self.shutdown_requested = true;
    }

    /// Runs callbacks and plans until both queues are empty or a shutdown
    /// is requested.
    pub fn execute(&mut self) {
        trace!("entering event loop");
        loop {
            if self.shutdown_requested {
                self.callback_queue.clear();
                self.plan_queue.clear();
                break;
            }

            if let Some(callback) = self.callback_queue.pop_front() {
                callback(self);
                continue;
            }

            if let Some(plan) = self.plan_queue.get_next_plan() {
                self.current_time = plan.time;
                (plan.data)(self);
            } else {
                break;
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
