//! Subscriptions to the two host notification channels that drive the
//! guardian.
//!
//! Sleep and power-off come from the `NSWorkspace` notification center; screen
//! unlock is only broadcast on the distributed notification center. Each has
//! its own observer class and subscription handle so the two stay independent.
//! Both deliver on the main thread.

use std::cell::RefCell;
use std::rc::Rc;

use objc2::rc::Retained;
use objc2::{DefinedClass, MainThreadOnly, define_class, msg_send, sel};
use objc2_app_kit::{NSWorkspace, NSWorkspaceWillPowerOffNotification, NSWorkspaceWillSleepNotification};
use objc2_foundation::{
    MainThreadMarker, NSDistributedNotificationCenter, NSNotification, NSNotificationCenter,
    NSObject, NSObjectProtocol, NSString,
};
use tracing::{info_span, trace, warn};

use crate::guardian::{SleepEvent, SleepHandler, UnlockHandler};

pub const SCREEN_UNLOCKED_NOTIFICATION: &str = "com.apple.screenIsUnlocked";

struct SleepObserverIvars {
    handler: Rc<RefCell<dyn SleepHandler>>,
}

define_class!(
    // SAFETY:
    // - The superclass NSObject does not have any subclassing requirements.
    // - `SleepObserver` does not implement `Drop`.
    #[unsafe(super(NSObject))]
    #[thread_kind = MainThreadOnly]
    #[name = "BluesnoozeSleepObserver"]
    #[ivars = SleepObserverIvars]
    struct SleepObserver;

    impl SleepObserver {
        #[unsafe(method(recvSleepEvent:))]
        fn recv_sleep_event(&self, notif: &NSNotification) {
            trace!("{notif:#?}");
            self.handle_sleep_event(notif);
        }
    }

    unsafe impl NSObjectProtocol for SleepObserver {}
);

impl SleepObserver {
    fn new(mtm: MainThreadMarker, handler: Rc<RefCell<dyn SleepHandler>>) -> Retained<Self> {
        let this = mtm.alloc::<Self>().set_ivars(SleepObserverIvars { handler });
        unsafe { msg_send![super(this), init] }
    }

    fn handle_sleep_event(&self, notif: &NSNotification) {
        let name = &*notif.name();
        let event = if unsafe { NSWorkspaceWillSleepNotification } == name {
            SleepEvent::WillSleep
        } else if unsafe { NSWorkspaceWillPowerOffNotification } == name {
            SleepEvent::WillPowerOff
        } else {
            warn!("Unexpected workspace notification: {notif:?}");
            return;
        };
        let span = info_span!("lifecycle::handle_sleep_event", ?event);
        let _s = span.enter();
        self.ivars().handler.borrow_mut().on_sleep_or_power_off(event);
    }
}

struct UnlockObserverIvars {
    handler: Rc<RefCell<dyn UnlockHandler>>,
}

define_class!(
    // SAFETY:
    // - The superclass NSObject does not have any subclassing requirements.
    // - `UnlockObserver` does not implement `Drop`.
    #[unsafe(super(NSObject))]
    #[thread_kind = MainThreadOnly]
    #[name = "BluesnoozeUnlockObserver"]
    #[ivars = UnlockObserverIvars]
    struct UnlockObserver;

    impl UnlockObserver {
        #[unsafe(method(recvUnlockEvent:))]
        fn recv_unlock_event(&self, notif: &NSNotification) {
            trace!("{notif:#?}");
            let span = info_span!("lifecycle::handle_unlock_event");
            let _s = span.enter();
            self.ivars().handler.borrow_mut().on_unlock();
        }
    }

    unsafe impl NSObjectProtocol for UnlockObserver {}
);

impl UnlockObserver {
    fn new(mtm: MainThreadMarker, handler: Rc<RefCell<dyn UnlockHandler>>) -> Retained<Self> {
        let this = mtm.alloc::<Self>().set_ivars(UnlockObserverIvars { handler });
        unsafe { msg_send![super(this), init] }
    }
}

/// Keeps the workspace sleep/power-off observer registered until dropped.
pub struct SleepSubscription {
    center: Retained<NSNotificationCenter>,
    observer: Retained<SleepObserver>,
}

impl SleepSubscription {
    pub fn register(mtm: MainThreadMarker, handler: Rc<RefCell<dyn SleepHandler>>) -> Self {
        let observer = SleepObserver::new(mtm, handler);
        let center = NSWorkspace::sharedWorkspace().notificationCenter();
        // SAFETY: Selector must have signature fn(&self, &NSNotification)
        unsafe {
            center.addObserver_selector_name_object(
                &observer,
                sel!(recvSleepEvent:),
                Some(NSWorkspaceWillSleepNotification),
                None,
            );
            center.addObserver_selector_name_object(
                &observer,
                sel!(recvSleepEvent:),
                Some(NSWorkspaceWillPowerOffNotification),
                None,
            );
        }
        trace!("registered for workspace sleep and power-off notifications");
        Self { center, observer }
    }
}

impl Drop for SleepSubscription {
    fn drop(&mut self) {
        unsafe { self.center.removeObserver(&self.observer) };
    }
}

/// Keeps the distributed screen-unlock observer registered until dropped.
pub struct UnlockSubscription {
    center: Retained<NSDistributedNotificationCenter>,
    observer: Retained<UnlockObserver>,
}

impl UnlockSubscription {
    pub fn register(mtm: MainThreadMarker, handler: Rc<RefCell<dyn UnlockHandler>>) -> Self {
        let observer = UnlockObserver::new(mtm, handler);
        let center = NSDistributedNotificationCenter::defaultCenter();
        let name = NSString::from_str(SCREEN_UNLOCKED_NOTIFICATION);
        // SAFETY: Selector must have signature fn(&self, &NSNotification)
        unsafe {
            center.addObserver_selector_name_object(
                &observer,
                sel!(recvUnlockEvent:),
                Some(&name),
                None,
            );
        }
        trace!("registered for {SCREEN_UNLOCKED_NOTIFICATION}");
        Self { center, observer }
    }
}

impl Drop for UnlockSubscription {
    fn drop(&mut self) {
        unsafe { self.center.removeObserver(&self.observer) };
    }
}
