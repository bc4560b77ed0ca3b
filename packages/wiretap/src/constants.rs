// A poisoned lock means a handler list may be half-updated. We refuse to continue (we panic).
pub(crate) const ERR_POISONED_LOCK: &str = "encountered poisoned lock - continued execution \
    is not safe because the handler registry may be in an inconsistent state";
