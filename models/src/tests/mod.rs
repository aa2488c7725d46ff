mod apdu;
mod device_info;
mod protocol;
