pub mod face_locator;
