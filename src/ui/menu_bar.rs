use std::cell::RefCell;

use objc2::rc::Retained;
use objc2::runtime::{AnyObject, Sel};
use objc2::{DefinedClass, MainThreadOnly, define_class, msg_send, sel};
use objc2_app_kit::{
    NSApplication, NSControlStateValueOff, NSControlStateValueOn, NSImage, NSMenu, NSMenuItem,
    NSStatusBar, NSStatusItem, NSVariableStatusItemLength,
};
use objc2_foundation::{MainThreadMarker, NSObject, NSObjectProtocol, NSString};
use tracing::{debug, info, warn};

use crate::sys::service::LaunchAtLogin;

const ICON_SYMBOL: &str = "moon.zzz";
const TITLE: &str = "Bluesnooze";

struct MenuTargetIvars {
    launch_at_login: LaunchAtLogin,
    launch_item: RefCell<Option<Retained<NSMenuItem>>>,
}

define_class!(
    // SAFETY:
    // - The superclass NSObject does not have any subclassing requirements.
    // - `MenuTarget` does not implement `Drop`.
    #[unsafe(super(NSObject))]
    #[thread_kind = MainThreadOnly]
    #[name = "BluesnoozeMenuTarget"]
    #[ivars = MenuTargetIvars]
    struct MenuTarget;

    impl MenuTarget {
        #[unsafe(method(launchAtLoginClicked:))]
        fn launch_at_login_clicked(&self, _sender: Option<&AnyObject>) {
            match self.ivars().launch_at_login.toggle() {
                Ok(enabled) => debug!(enabled, "launch at login toggled from menu"),
                Err(e) => warn!("failed to toggle launch at login: {e}"),
            }
            self.sync_launch_state();
        }

        #[unsafe(method(quitClicked:))]
        fn quit_clicked(&self, _sender: Option<&AnyObject>) {
            info!("quit requested from menu");
            unsafe { NSApplication::sharedApplication(self.mtm()).terminate(None) };
        }
    }

    unsafe impl NSObjectProtocol for MenuTarget {}
);

impl MenuTarget {
    fn new(mtm: MainThreadMarker, launch_at_login: LaunchAtLogin) -> Retained<Self> {
        let this = mtm.alloc::<Self>().set_ivars(MenuTargetIvars {
            launch_at_login,
            launch_item: RefCell::new(None),
        });
        unsafe { msg_send![super(this), init] }
    }

    fn sync_launch_state(&self) {
        let ivars = self.ivars();
        let item = ivars.launch_item.borrow();
        let Some(item) = item.as_ref() else { return };
        let state = if ivars.launch_at_login.is_enabled() {
            NSControlStateValueOn
        } else {
            NSControlStateValueOff
        };
        item.setState(state);
    }
}

/// The status bar item and its menu. Removed from the status bar on drop.
pub struct StatusMenu {
    status_item: Retained<NSStatusItem>,
    _menu: Retained<NSMenu>,
    _target: Retained<MenuTarget>,
}

impl StatusMenu {
    pub fn new(mtm: MainThreadMarker, launch_at_login: LaunchAtLogin) -> Self {
        let target = MenuTarget::new(mtm, launch_at_login);

        let menu = NSMenu::new(mtm);
        let launch_item = menu_item(mtm, "Launch at login", sel!(launchAtLoginClicked:), "", &target);
        menu.addItem(&launch_item);
        menu.addItem(&NSMenuItem::separatorItem(mtm));
        let quit_item = menu_item(mtm, "Quit Bluesnooze", sel!(quitClicked:), "q", &target);
        menu.addItem(&quit_item);

        *target.ivars().launch_item.borrow_mut() = Some(launch_item);
        target.sync_launch_state();

        let status_bar = NSStatusBar::systemStatusBar();
        let status_item = status_bar.statusItemWithLength(NSVariableStatusItemLength);
        if let Some(btn) = status_item.button(mtm) {
            let icon = unsafe {
                NSImage::imageWithSystemSymbolName_accessibilityDescription(
                    &NSString::from_str(ICON_SYMBOL),
                    Some(&NSString::from_str(TITLE)),
                )
            };
            match icon {
                Some(icon) => {
                    icon.setTemplate(true);
                    unsafe { btn.setImage(Some(&icon)) };
                }
                None => btn.setTitle(&NSString::from_str(TITLE)),
            }
        }
        status_item.setMenu(Some(&menu));
        status_item.setVisible(true);

        Self {
            status_item,
            _menu: menu,
            _target: target,
        }
    }
}

impl Drop for StatusMenu {
    fn drop(&mut self) {
        debug!("Removing status bar item");

        let status_bar = NSStatusBar::systemStatusBar();
        status_bar.removeStatusItem(&self.status_item);
    }
}

fn menu_item(
    mtm: MainThreadMarker,
    title: &str,
    action: Sel,
    key: &str,
    target: &MenuTarget,
) -> Retained<NSMenuItem> {
    let item = unsafe {
        NSMenuItem::initWithTitle_action_keyEquivalent(
            mtm.alloc(),
            &NSString::from_str(title),
            Some(action),
            &NSString::from_str(key),
        )
    };
    let target: &AnyObject = target;
    unsafe { item.setTarget(Some(target)) };
    item
}
