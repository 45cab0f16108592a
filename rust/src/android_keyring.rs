//! Android-only early init hook for keyring-core and ndk-context.
//!
//! The shell loads us through UniFFI/JNA, so nothing initializes `ndk-context`
//! for us. The Android keystore-backed token store needs it.
//!
//! Kotlin calls `com.pickupapp.Keyring.init(Context)` very early in `MainActivity`.

#![cfg(target_os = "android")]

use std::ffi::c_void;
use std::sync::OnceLock;

use jni::objects::{JClass, JObject};
use jni::JNIEnv;

static INIT: OnceLock<()> = OnceLock::new();

#[no_mangle]
pub extern "system" fn Java_com_pickupapp_Keyring_init(
    env: JNIEnv,
    _class: JClass,
    context: JObject,
) {
    // Keep the first initialization.
    if INIT.set(()).is_err() {
        return;
    }

    // Global ref so the context outlives this JNI call.
    let global_ctx = match env.new_global_ref(context) {
        Ok(g) => g,
        Err(_) => return,
    };

    let vm = match env.get_java_vm() {
        Ok(vm) => vm,
        Err(_) => return,
    };

    unsafe {
        ndk_context::initialize_android_context(
            vm.get_java_vm_pointer().cast::<c_void>(),
            global_ctx.as_obj().as_raw().cast::<c_void>(),
        );
    }

    // ndk-context holds the raw pointer for the rest of the process.
    std::mem::forget(global_ctx);

    if let Err(e) = crate::keyring_support::init_keyring_once("") {
        tracing::error!(%e, "keyring init failed");
    }
}
